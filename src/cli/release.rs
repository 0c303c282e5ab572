use clap::{arg, Command};

use crate::context::{required, Context};

pub fn args() -> Command {
    Command::new("release")
        .about("Dispatch releases")
        .subcommand_required(true)
        .subcommand(
            Command::new("force")
                .about("Deploy release onto a target, bypassing approval")
                .arg(arg!(<RELEASE_ID> "ID of release"))
                .arg(arg!(-t --target <TARGET_ID> "ID of target").required(true))
                .arg(arg!(-e --environment <ENVIRONMENT_ID> "ID of environment").required(true))
                .arg_required_else_help(true),
        )
}

pub async fn handlers(model_match: &clap::ArgMatches, context: &Context) -> anyhow::Result<()> {
    match model_match.subcommand() {
        Some(("force", force_match)) => {
            let release_id = required(force_match, "RELEASE_ID")?;
            let target_id = required(force_match, "target")?;
            let environment_id = required(force_match, "environment")?;

            let job = context
                .services
                .dispatcher
                .force_release(release_id, target_id, environment_id, &None)
                .await?;

            println!(
                "release '{release_id}' forced onto target '{target_id}' as job '{}'",
                job.id
            );

            Ok(())
        }
        _ => unreachable!(), // If all subcommands are defined above, anything else is unreachable
    }
}
