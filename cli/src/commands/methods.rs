use colored::*;
use vigil_common::AliveTests;

use crate::terminal::print;

pub fn methods() {
    print::header("alive-test methods");
    for (name, bits) in AliveTests::names() {
        print::print(&format!(
            " {:>3}  {}",
            bits.to_string().cyan(),
            name.bright_green()
        ));
    }
    print::print(&format!(
        "{}",
        "Combine names with ',' or add up the values.".bright_black()
    ));
}
