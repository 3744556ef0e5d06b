#![cfg(test)]

mod detection;
mod link_layer;
mod support;
