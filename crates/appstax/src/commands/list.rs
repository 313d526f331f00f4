//! `appstax list` -- one query, sorted like a watch would sort it.

use appstax_core::{ClientConfig, FindOptions, ObjectSource, RestObjectSource};
use tracing::debug;

use crate::cli::{GlobalOpts, QueryArgs};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    config: &ClientConfig,
    args: &QueryArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let source = RestObjectSource::from_config(config)?;
    let options = args.watch_options();
    let find = FindOptions::expand(options.expand_depth());

    let mut objects = match options.filter_expr() {
        "" => source.find_all(&args.collection, find).await?,
        query => source.find(&args.collection, query, find).await?,
    };
    debug!(collection = %args.collection, count = objects.len(), "fetched");

    let order = options.order_spec();
    objects.sort_by(|a, b| order.compare(a, b));

    let out = output::render_objects(global.output, objects.as_slice(), &args.columns)?;
    output::print_output(&out, global.quiet);
    Ok(())
}
