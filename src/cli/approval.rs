use clap::{arg, Command};

use crate::context::{required, Context};

pub fn args() -> Command {
    Command::new("approval")
        .about("Resolve release approvals")
        .subcommand_required(true)
        .subcommand(
            Command::new("approve")
                .about("Approve release under an environment policy")
                .arg(arg!(<POLICY_ID> "ID of environment policy"))
                .arg(arg!(<RELEASE_ID> "ID of release"))
                .arg_required_else_help(true),
        )
        .subcommand(
            Command::new("reject")
                .about("Reject release under an environment policy")
                .arg(arg!(<POLICY_ID> "ID of environment policy"))
                .arg(arg!(<RELEASE_ID> "ID of release"))
                .arg_required_else_help(true),
        )
}

pub async fn handlers(model_match: &clap::ArgMatches, context: &Context) -> anyhow::Result<()> {
    match model_match.subcommand() {
        Some(("approve", approve_match)) => {
            let policy_id = required(approve_match, "POLICY_ID")?;
            let release_id = required(approve_match, "RELEASE_ID")?;

            context
                .services
                .approval
                .approve(policy_id, release_id, &None)
                .await?;

            // The dispatcher resumes waiting triggers from the approval event.
            println!("release '{release_id}' approved");

            Ok(())
        }
        Some(("reject", reject_match)) => {
            let policy_id = required(reject_match, "POLICY_ID")?;
            let release_id = required(reject_match, "RELEASE_ID")?;

            context
                .services
                .approval
                .reject(policy_id, release_id, &None)
                .await?;

            println!("release '{release_id}' rejected");

            Ok(())
        }
        _ => unreachable!(), // If all subcommands are defined above, anything else is unreachable
    }
}
