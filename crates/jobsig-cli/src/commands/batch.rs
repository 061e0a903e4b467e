use anyhow::{anyhow, bail};
use jobsig_batch::{EmitOutcome, HttpSubmitter};
use jobsig_core::version_store::FsVersionStore;
use jobsig_core::Archetype;

use super::{connect, truncate};

pub async fn open(archetype: &str, profile_state: &str) -> anyhow::Result<()> {
    let archetype = parse_archetype(archetype)?;
    let profile_state = parse_archetype(profile_state)?;

    let (_config, pool) = connect().await?;
    let batch_id = jobsig_batch::open_batch(&pool, archetype, profile_state).await?;
    println!("Opened batch #{batch_id} for {archetype}.");
    Ok(())
}

pub async fn emit(limit: usize) -> anyhow::Result<()> {
    let (config, pool) = connect().await?;

    let Some(batch) = jobsig_db::get_open_batch(&pool).await? else {
        bail!("no batch is open; run `jobsig batch open <archetype>` first");
    };
    let archetype = Archetype::parse(&batch.archetype)
        .ok_or_else(|| anyhow!("batch {} has unknown archetype", batch.id))?;

    let submitter_url = config
        .submitter_url
        .as_deref()
        .ok_or_else(|| anyhow!("JOBSIG_SUBMITTER_URL is not set; cannot emit"))?;
    let submitter = HttpSubmitter::new(submitter_url, config.external_timeout_secs);
    let versions = FsVersionStore::new(config.variant_root.clone());

    let queued = jobsig_batch::queued_listings(&pool, archetype).await?;
    if queued.is_empty() {
        println!("Queue for {archetype} is empty.");
        return Ok(());
    }

    let mut recorded = 0usize;
    let mut failed = 0usize;
    for listing in queued.iter().take(limit) {
        match jobsig_batch::emit(&pool, &submitter, &versions, batch.id, listing).await? {
            EmitOutcome::Recorded(application_id) => {
                recorded += 1;
                println!(
                    "  applied #{application_id}  {}  {}",
                    listing.listing_id,
                    truncate(&listing.title, 40)
                );
            }
            EmitOutcome::Failed(failure) => {
                failed += 1;
                println!("  FAILED   {}  {failure}", listing.listing_id);
            }
        }
    }

    println!("Batch #{}: {recorded} recorded, {failed} failed.", batch.id);
    Ok(())
}

pub async fn close() -> anyhow::Result<()> {
    let (_config, pool) = connect().await?;
    let Some(batch) = jobsig_db::get_open_batch(&pool).await? else {
        bail!("no batch is open");
    };

    let closed = jobsig_batch::close_batch(&pool, batch.id).await?;
    println!(
        "Closed batch #{} ({}) with {} application(s).",
        closed.id, closed.archetype, closed.application_count
    );
    Ok(())
}

fn parse_archetype(raw: &str) -> anyhow::Result<Archetype> {
    Archetype::parse(raw).ok_or_else(|| {
        anyhow!("unknown archetype '{raw}' (expected builder, fixer, operator, or translator)")
    })
}
