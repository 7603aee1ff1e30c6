use anyhow::Result;

use gpumon::commands::{build_cli, monitor};

fn main() -> Result<()> {
    gpumon::init_logging();

    let matches = build_cli().get_matches();
    monitor::execute(&matches)
}
