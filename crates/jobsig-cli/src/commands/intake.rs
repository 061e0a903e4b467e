use chrono::{NaiveDate, Utc};
use jobsig_db::{append_spool, NewCall, SpoolRecord};
use jobsig_feedback::CallIntake;

use super::connect;

pub struct CallArgs {
    pub entity: String,
    pub title: String,
    pub outcome: String,
    pub phone: Option<String>,
    pub notes: String,
    pub date: Option<NaiveDate>,
}

pub async fn run(args: CallArgs) -> anyhow::Result<()> {
    let (config, pool) = connect().await?;
    let intake = CallIntake {
        phone: args.phone,
        entity: args.entity,
        title: args.title,
        outcome: args.outcome,
        notes: args.notes,
        call_date: args.date.unwrap_or_else(|| Utc::now().date_naive()),
    };

    match jobsig_feedback::log_call(&pool, &config.engine, &intake).await {
        Ok(logged) => {
            match logged.matched_application_id {
                Some(application_id) => println!(
                    "Logged call #{} and matched application #{application_id}.",
                    logged.call_id
                ),
                None => println!(
                    "Logged call #{} (no confident application match).",
                    logged.call_id
                ),
            }
            Ok(())
        }
        Err(jobsig_feedback::FeedbackError::Db(e)) if e.is_transient() => {
            // Store unreachable: spill to the spool and flush later via
            // `jobsig sync`.
            append_spool(
                &config.data_dir,
                &SpoolRecord::Call(NewCall {
                    phone: intake.phone,
                    entity: intake.entity,
                    title: intake.title,
                    outcome: intake.outcome,
                    notes: intake.notes,
                    call_date: intake.call_date,
                    matched_application_id: None,
                }),
            )?;
            println!("Store unreachable; call spooled locally. Run `jobsig sync` later.");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
