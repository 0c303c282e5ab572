use ascii_table::{Align, AsciiTable};
use clap::{arg, Command};
use trellis::models::JobStatus;

use crate::context::{required, Context};

pub fn args() -> Command {
    Command::new("job")
        .about("Inspect and update jobs")
        .subcommand_required(true)
        .subcommand(
            Command::new("active")
                .about("List jobs a job agent should run")
                .arg(arg!(<AGENT_ID> "ID of job agent"))
                .arg_required_else_help(true),
        )
        .subcommand(
            Command::new("status")
                .about("Report job status")
                .arg(arg!(<JOB_ID> "ID of job"))
                .arg(arg!(<STATUS> "New status, e.g. running or completed"))
                .arg(arg!(-m --message <MESSAGE> "Status message"))
                .arg_required_else_help(true),
        )
}

pub async fn handlers(model_match: &clap::ArgMatches, context: &Context) -> anyhow::Result<()> {
    let job_service = &context.services.job;

    match model_match.subcommand() {
        Some(("active", active_match)) => {
            let agent_id = required(active_match, "AGENT_ID")?;

            let jobs = job_service.get_active_for_agent(agent_id).await?;

            if jobs.is_empty() {
                println!("No active jobs found");

                return Ok(());
            }

            let table_data: Vec<Vec<String>> = jobs
                .into_iter()
                .map(|job| {
                    vec![
                        job.id,
                        job.release_id,
                        job.target_id.unwrap_or_default(),
                        job.status.to_string(),
                    ]
                })
                .collect();

            let mut ascii_table = AsciiTable::default();

            for (index, header) in ["ID", "RELEASE", "TARGET", "STATUS"]
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
        Some(("status", status_match)) => {
            let job_id = required(status_match, "JOB_ID")?;
            let status: JobStatus = required(status_match, "STATUS")?.parse()?;
            let message = status_match.get_one::<String>("message").map(String::as_str);

            let job = job_service
                .update_status(job_id, status, message, &None)
                .await?;

            println!("job '{}' is {}", job.id, job.status);

            Ok(())
        }
        _ => unreachable!(), // If all subcommands are defined above, anything else is unreachable
    }
}
