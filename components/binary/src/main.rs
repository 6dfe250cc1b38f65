// Copyright 2024 httpvfs
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

mod build_info;
mod cmd;

use clap::{Parser, Subcommand};
use snafu::Whatever;

use crate::cmd::{cat::CatArgs, scan::ScanArgs, stat::StatArgs};

#[derive(Debug, Parser)]
#[clap(
    name = "httpvfs",
    about = "Read remote files over http range requests",
    author = build_info::AUTHOR,
    version = build_info::FULL_VERSION,
)]
struct Cli {
    #[command(subcommand)]
    commands: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Stat(StatArgs),
    Cat(CatArgs),
    Scan(ScanArgs),
}

fn main() -> Result<(), Whatever> {
    human_panic::setup_panic!();
    let cli = Cli::parse();
    match cli.commands {
        Commands::Stat(args) => args.run(),
        Commands::Cat(args) => args.run(),
        Commands::Scan(args) => args.run(),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() { Cli::command().debug_assert(); }

    #[test]
    fn parse_cat() {
        let cli = Cli::try_parse_from([
            "httpvfs",
            "cat",
            "https://example.org/config.json",
            "--offset",
            "4K",
            "--length",
            "100",
            "--max-bytes",
            "1MiB",
        ])
        .unwrap();
        let Commands::Cat(args) = cli.commands else {
            panic!("expected cat");
        };
        assert_eq!(args.offset.as_bytes(), 4096);
        assert_eq!(args.length.map(|l| l.as_bytes()), Some(100));
        assert_eq!(args.source.max_bytes.map(|b| b.as_bytes()), Some(1 << 20));
        assert_eq!(args.source.max_read_heads, 3);
    }

    #[test]
    fn bad_size_is_rejected() {
        let args = ["httpvfs", "stat", "c.json", "--max-read-speed", "fast"];
        assert!(Cli::try_parse_from(args).is_err());
    }
}
