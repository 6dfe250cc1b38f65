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

use clap::Args;
use snafu::{ResultExt, Whatever};

use super::SourceArgs;

#[derive(Debug, Clone, Args)]
#[command(long_about = r"

Open the remote file and print its size and request statistics as json.
Examples:

httpvfs stat https://example.org/db/config.json
")]
pub struct StatArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

impl StatArgs {
    pub fn run(self) -> Result<(), Whatever> {
        let _guards = self.source.init_logging();
        let worker = self.source.open()?;
        let stats = worker
            .client()
            .stats(None)
            .with_whatever_context(|e| format!("failed to get stats; {}", e))?;
        let out = serde_json::to_string_pretty(&stats)
            .with_whatever_context(|e| format!("failed to render stats; {}", e))?;
        println!("{}", out);
        worker
            .shutdown()
            .with_whatever_context(|e| format!("failed to close the session; {}", e))
    }
}
