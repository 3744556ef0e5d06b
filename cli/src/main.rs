mod commands;
mod terminal;

use commands::{CommandLine, Commands, detect, methods};
use terminal::{logging, print};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let commands = CommandLine::parse_args();

    logging::init(commands.verbose);
    print::banner();

    match commands.command {
        Commands::Detect(args) => {
            print::header("getting ready for alive detection");
            detect::detect(args).await
        }
        Commands::Methods => {
            methods::methods();
            Ok(())
        }
    }
}
