//! `skein fetch`: load a collection, optionally following pages or
//! refreshing on an interval.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use skein_api::{Error as ApiError, HttpClient, Pagination, Summary};
use skein_core::{Collection, CollectionState};

use crate::cli::{FetchArgs, GlobalOpts};
use crate::config::Config;
use crate::error::CliError;
use crate::output;

/// The last failure reported by the collection, with its original error kind.
type FailureSlot = Arc<Mutex<Option<CliError>>>;

#[derive(Debug, Serialize)]
struct FetchOutput<'a> {
    items: &'a [Value],
    pagination: &'a Pagination,
    summary: &'a Summary,
}

pub async fn handle(
    args: FetchArgs,
    cfg: &Config,
    client: Arc<HttpClient>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let body = args
        .data
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()?;

    let failure = FailureSlot::default();
    let sink = Arc::clone(&failure);
    let path = args.path.clone();

    let mut options = cfg.collection_options::<Value>();
    options.enable_cache |= args.cache;
    if let Some(ttl) = args.cache_ttl {
        options.cache_duration = Duration::from_secs(ttl);
    }
    options.default_query_string.clone_from(&args.query);
    options.post_data = body;
    options.on_error = Some(Arc::new(move |err: &ApiError| {
        *sink.lock().unwrap_or_else(PoisonError::into_inner) = Some(CliError::from_api(err, &path));
    }));

    let collection = Collection::<Value>::builder(client, args.path.as_str())
        .options(options)
        .build();

    collection.fetch().await;
    let mut state = settled(&collection, &failure)?;

    if args.all_pages {
        state = follow_pages(&collection, &failure, &args, state).await?;
    }
    print_state(&state, &args, global)?;

    if let Some(secs) = args.watch {
        watch(&collection, &failure, &args, global, secs).await?;
    }

    collection.unmount();
    Ok(())
}

/// Walk `current_page` up to `total_pages`, accumulating items.
async fn follow_pages(
    collection: &Collection<Value>,
    failure: &FailureSlot,
    args: &FetchArgs,
    first: CollectionState<Value>,
) -> Result<CollectionState<Value>, CliError> {
    let mut items = first.items.clone();
    let mut state = first;

    while let (Some(current), Some(total)) =
        (state.pagination.current_page, state.pagination.total_pages)
    {
        if current >= total {
            break;
        }
        let query = page_query(args.query.as_deref(), &args.page_param, current + 1);
        debug!(page = current + 1, total, "following pagination");
        if let Some(handle) = collection.set_query_string(Some(query)) {
            join(handle).await?;
        }
        state = settled(collection, failure)?;

        // A server that ignores the page parameter would loop forever.
        if state.pagination.current_page.is_none_or(|page| page <= current) {
            warn!(current, "server did not advance the page, stopping");
            break;
        }
        items.extend(state.items.iter().cloned());
    }

    state.items = items;
    Ok(state)
}

/// Refresh every `secs` seconds until `--count` results or Ctrl-C.
async fn watch(
    collection: &Collection<Value>,
    failure: &FailureSlot,
    args: &FetchArgs,
    global: &GlobalOpts,
    secs: u64,
) -> Result<(), CliError> {
    let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
    // The first tick completes immediately; the initial fetch already ran.
    ticker.tick().await;

    let mut printed = 1;
    while args.count.is_none_or(|limit| printed < limit) {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }

        if let Some(handle) = collection.refresh() {
            join(handle).await?;
        }
        match settled(collection, failure) {
            Ok(state) => print_state(&state, args, global)?,
            Err(err) => warn!(error = %err, "refresh failed"),
        }
        printed += 1;
    }
    Ok(())
}

/// The current state, or the failure the last fetch reported.
fn settled(
    collection: &Collection<Value>,
    failure: &FailureSlot,
) -> Result<CollectionState<Value>, CliError> {
    let state = collection.snapshot();
    let reported = failure
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    match state.error {
        None => Ok(state),
        Some(ref message) => Err(reported.unwrap_or_else(|| CliError::Api {
            status: None,
            message: message.clone(),
        })),
    }
}

fn print_state(
    state: &CollectionState<Value>,
    args: &FetchArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let rendered = if args.items_only || matches!(global.output, crate::cli::OutputFormat::Plain) {
        output::render_list(&global.output, &state.items)?
    } else {
        output::render_single(
            &global.output,
            &FetchOutput {
                items: &state.items,
                pagination: &state.pagination,
                summary: &state.summary,
            },
        )?
    };
    output::print_output(&rendered, global.quiet);
    Ok(())
}

async fn join(handle: JoinHandle<()>) -> Result<(), CliError> {
    handle.await.map_err(|e| CliError::Api {
        status: None,
        message: format!("fetch task failed: {e}"),
    })
}

/// `base` with any existing `param=` pair replaced by `param=page`.
fn page_query(base: Option<&str>, param: &str, page: u64) -> String {
    let prefix = format!("{param}=");
    let mut parts: Vec<String> = base
        .unwrap_or_default()
        .trim_start_matches(['?', '&'])
        .split('&')
        .filter(|part| !part.is_empty() && !part.starts_with(&prefix))
        .map(str::to_owned)
        .collect();
    parts.push(format!("{prefix}{page}"));
    parts.join("&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_appends_to_empty() {
        assert_eq!(page_query(None, "page", 2), "page=2");
    }

    #[test]
    fn page_query_replaces_existing_page() {
        assert_eq!(
            page_query(Some("?status=open&page=1&sort=asc"), "page", 3),
            "status=open&sort=asc&page=3"
        );
    }

    #[test]
    fn page_query_honours_custom_param() {
        assert_eq!(page_query(Some("p=9"), "p", 10), "p=10");
        assert_eq!(page_query(Some("pages=1"), "page", 2), "pages=1&page=2");
    }
}
