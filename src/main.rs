use anyhow::Result;

fn main() -> Result<()> {
    let cli = pipeshell::cli::parse_args();
    pipeshell::cli::run(cli)
}
