use clap::Command;

mod approval;
mod context;
mod job;
mod provider;
mod release;
mod target;

use context::Context;

fn cli() -> Command {
    Command::new("trellis")
        .about("target reconciliation and release dispatch")
        .version("0.1.0")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(approval::args())
        .subcommand(job::args())
        .subcommand(provider::args())
        .subcommand(release::args())
        .subcommand(target::args())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let matches = cli().get_matches();

    let context = Context::from_env().await?;

    match matches.subcommand() {
        Some(("approval", submatches)) => Ok(approval::handlers(submatches, &context).await?),
        Some(("job", submatches)) => Ok(job::handlers(submatches, &context).await?),
        Some(("provider", submatches)) => Ok(provider::handlers(submatches, &context).await?),
        Some(("release", submatches)) => Ok(release::handlers(submatches, &context).await?),
        Some(("target", submatches)) => Ok(target::handlers(submatches, &context).await?),
        _ => unreachable!(), // If all subcommands are defined above, anything else is unreachable
    }
}
