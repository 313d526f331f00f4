//! `appstax watch` -- a live model with one watch, reprinted on change.

use appstax_core::{ClientConfig, Model, ModelEventKind};
use tracing::{debug, info};

use crate::cli::{GlobalOpts, WatchArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    mut config: ClientConfig,
    args: &WatchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if args.no_realtime {
        config.realtime_enabled = false;
    }

    let model = Model::connect(&config)?;
    let name = args.query.collection.clone();
    let handle = model.watch(&name, args.query.watch_options()).await?;
    let mut results = handle.results().ok_or(CliError::ModelClosed)?;

    let listener = model.on(ModelEventKind::Change, |event| {
        debug!(watch = ?event.watch, "change");
    });
    let color = output::should_color(global.color);
    let mut updates: u64 = 0;
    // The initial load may have landed before we subscribed.
    let mut pending = Some(results.current().clone()).filter(|s| !s.is_empty());

    loop {
        let snapshot = if let Some(snapshot) = pending.take() {
            snapshot
        } else {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted");
                    break;
                }
                snapshot = results.changed() => match snapshot {
                    Some(snapshot) => snapshot,
                    None => break,
                },
            }
        };
        updates += 1;

        if !global.quiet {
            eprintln!("{}", output::banner(&name, snapshot.len(), updates, color));
        }
        let out = output::render_objects(global.output, snapshot.as_slice(), &args.query.columns)?;
        output::print_output(&out, global.quiet);

        if args.changes.is_some_and(|limit| updates >= limit) {
            break;
        }
    }

    model.off(listener);
    handle.dispose().await?;
    model.shutdown().await;
    Ok(())
}
