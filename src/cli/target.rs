use ascii_table::{Align, AsciiTable};
use clap::{arg, Command};

use crate::context::{required, Context};

pub fn args() -> Command {
    Command::new("target")
        .about("Manage targets")
        .subcommand_required(true)
        .subcommand(
            Command::new("list")
                .about("List targets")
                .arg(arg!(--provider <PROVIDER_ID> "Only targets scanned by this provider")),
        )
        .subcommand(
            Command::new("lock")
                .about("Lock target so no release is dispatched onto it")
                .arg(arg!(<ID> "ID of target"))
                .arg_required_else_help(true),
        )
        .subcommand(
            Command::new("unlock")
                .about("Unlock target")
                .arg(arg!(<ID> "ID of target"))
                .arg_required_else_help(true),
        )
}

pub async fn handlers(model_match: &clap::ArgMatches, context: &Context) -> anyhow::Result<()> {
    let target_service = &context.services.target;

    match model_match.subcommand() {
        Some(("list", list_match)) => {
            let targets = match list_match.get_one::<String>("provider") {
                Some(provider_id) => target_service.get_by_provider_id(provider_id).await?,
                None => target_service.list().await?,
            };

            if targets.is_empty() {
                println!("No targets found");

                return Ok(());
            }

            let table_data: Vec<Vec<String>> = targets
                .into_iter()
                .map(|target| {
                    let locked = if target.is_locked() { "yes" } else { "no" };
                    vec![
                        target.id,
                        target.identifier,
                        target.kind.to_string(),
                        target.version,
                        locked.to_string(),
                    ]
                })
                .collect();

            let mut ascii_table = AsciiTable::default();

            for (index, header) in ["ID", "IDENTIFIER", "KIND", "VERSION", "LOCKED"]
                .into_iter()
                .enumerate()
            {
                ascii_table
                    .column(index)
                    .set_header(header)
                    .set_align(Align::Left);
            }

            ascii_table.print(table_data);

            Ok(())
        }
        Some(("lock", lock_match)) => {
            let id = required(lock_match, "ID")?;

            let target = target_service.lock(id, &None).await?;

            println!("target '{}' locked", target.identifier);

            Ok(())
        }
        Some(("unlock", unlock_match)) => {
            let id = required(unlock_match, "ID")?;

            let target = target_service.unlock(id, &None).await?;

            println!("target '{}' unlocked", target.identifier);

            Ok(())
        }
        _ => unreachable!(), // If all subcommands are defined above, anything else is unreachable
    }
}
