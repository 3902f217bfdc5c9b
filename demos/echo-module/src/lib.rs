//! Example module plugin for ledgerctl.
//!
//! Build with `cargo build --release -p ledgerctl-echo-module`, then
//! `ledgerctl plugin install demos/echo-module`. The plugin must be built
//! with the same compiler and ledgerctl version as the host binary.

use std::io::Write;
use std::sync::Arc;

use async_trait::async_trait;
use ledgerctl::config::Streams;
use ledgerctl::plugins::{PluginCommand, PluginContext};
use ledgerctl::Result;

struct Echo {
    streams: Arc<Streams>,
}

#[async_trait]
impl PluginCommand for Echo {
    async fn run(&self, args: Vec<String>) -> Result<()> {
        let mut out = self.streams.out()?;
        writeln!(out, "{}", args.join(" "))?;
        Ok(())
    }
}

fn new(ctx: &PluginContext) -> Box<dyn PluginCommand> {
    Box::new(Echo {
        streams: Arc::clone(&ctx.streams),
    })
}

ledgerctl::export_plugin!(new);
