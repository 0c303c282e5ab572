use ascii_table::{Align, AsciiTable};
use clap::{arg, Arg, ArgAction, ArgMatches, Command};
use trellis::{
    models::{GoogleProviderConfig, TargetProvider, TargetProviderConfig},
    reconciliation::{ReconcileReport, Reconciler},
};
use uuid::Uuid;

use crate::context::{required, Context};

pub fn args() -> Command {
    Command::new("provider")
        .about("Manage target providers")
        .subcommand_required(true)
        .subcommand(
            Command::new("create")
                .about("Create a Google target provider")
                .arg(arg!(<NAME> "Name of provider"))
                .arg(
                    Arg::new("workspace")
                        .short('w')
                        .long("workspace")
                        .help("owning workspace id")
                        .required(true)
                        .action(ArgAction::Set),
                )
                .arg(
                    Arg::new("project-id")
                        .short('p')
                        .long("project-id")
                        .help("Google Cloud project to scan, repeatable")
                        .required(true)
                        .action(ArgAction::Append),
                )
                .arg(
                    Arg::new("impersonate-service-account")
                        .long("impersonate-service-account")
                        .help("service account scans run as")
                        .action(ArgAction::Set),
                )
                .arg_required_else_help(true),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete target provider")
                .arg(arg!(<ID> "ID of provider"))
                .arg_required_else_help(true),
        )
        .subcommand(Command::new("list").about("List target providers"))
        .subcommand(
            Command::new("scan")
                .about("Scan providers and reconcile their targets")
                .arg(arg!([ID] "ID of provider, all providers when omitted")),
        )
}

fn print_report(report: &ReconcileReport) {
    println!(
        "provider '{}': {} targets upserted",
        report.provider_id, report.upserted
    );

    for error in &report.errors {
        println!("  error: {error}");
    }
}

fn provider_from_matches(create_match: &ArgMatches) -> anyhow::Result<TargetProvider> {
    let project_ids: Vec<String> = create_match
        .get_many::<String>("project-id")
        .ok_or_else(|| anyhow::anyhow!("at least one --project-id is required"))?
        .cloned()
        .collect();

    Ok(TargetProvider {
        id: Uuid::new_v4().to_string(),
        workspace_id: required(create_match, "workspace")?.to_string(),
        name: required(create_match, "NAME")?.to_string(),
        config: TargetProviderConfig::Google(GoogleProviderConfig {
            project_ids,
            impersonate_service_account: create_match
                .get_one::<String>("impersonate-service-account")
                .cloned(),
        }),
    })
}

pub async fn handlers(model_match: &clap::ArgMatches, context: &Context) -> anyhow::Result<()> {
    match model_match.subcommand() {
        Some(("create", create_match)) => {
            let provider = provider_from_matches(create_match)?;

            context
                .services
                .target_provider
                .upsert(&provider, &None)
                .await?;

            println!("target provider '{}' created with id {}", provider.name, provider.id);

            Ok(())
        }
        Some(("delete", delete_match)) => {
            let id = required(delete_match, "ID")?;

            context.services.target_provider.delete(id, &None).await?;

            println!("target provider '{id}' deleted");

            Ok(())
        }
        Some(("list", _)) => {
            let providers = context.services.target_provider.list().await?;

            if providers.is_empty() {
                println!("No target providers found");

                return Ok(());
            }

            let table_data: Vec<Vec<String>> = providers
                .into_iter()
                .map(|provider| {
                    let kind = provider.config.kind().to_string();
                    vec![provider.id, provider.workspace_id, provider.name, kind]
                })
                .collect();

            let mut ascii_table = AsciiTable::default();

            for (index, header) in ["ID", "WORKSPACE", "NAME", "KIND"].into_iter().enumerate() {
                ascii_table
                    .column(index)
                    .set_header(header)
                    .set_align(Align::Left);
            }

            ascii_table.print(table_data);

            Ok(())
        }
        Some(("scan", scan_match)) => {
            let reconciler = Reconciler::from_config(&context.config, &context.services)?;

            if scan_match.get_one::<String>("ID").is_none() {
                for report in reconciler.reconcile_all().await? {
                    print_report(&report);
                }

                return Ok(());
            }

            let id = required(scan_match, "ID")?;
            let provider = context
                .services
                .target_provider
                .get_by_id(id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("Target provider id {id} not found"))?;

            print_report(&reconciler.reconcile(&provider).await?);

            Ok(())
        }
        _ => unreachable!(), // If all subcommands are defined above, anything else is unreachable
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_builds_google_provider() {
        let matches = args()
            .try_get_matches_from([
                "provider",
                "create",
                "gke-prod",
                "--workspace",
                "workspace-1",
                "--project-id",
                "project-a",
                "-p",
                "project-b",
                "--impersonate-service-account",
                "scanner@project-a.iam.gserviceaccount.com",
            ])
            .unwrap();
        let (_, create_match) = matches.subcommand().unwrap();

        let provider = provider_from_matches(create_match).unwrap();

        assert_eq!(provider.name, "gke-prod");
        assert_eq!(provider.workspace_id, "workspace-1");
        assert!(Uuid::parse_str(&provider.id).is_ok());
        assert_eq!(
            provider.config,
            TargetProviderConfig::Google(GoogleProviderConfig {
                project_ids: vec!["project-a".to_string(), "project-b".to_string()],
                impersonate_service_account: Some(
                    "scanner@project-a.iam.gserviceaccount.com".to_string()
                ),
            })
        );
    }

    #[test]
    fn test_create_requires_project() {
        let result = args().try_get_matches_from([
            "provider",
            "create",
            "gke-prod",
            "--workspace",
            "workspace-1",
        ]);

        assert!(result.is_err());
    }
}
