//! `skein call`: one request, raw JSON body out.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use skein_api::{Error as ApiError, HttpClient};
use skein_core::ApiRequest;

use crate::cli::{CallArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    args: CallArgs,
    client: Arc<HttpClient>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let body = args
        .data
        .as_deref()
        .map(serde_json::from_str::<Value>)
        .transpose()?;

    let failure: Arc<Mutex<Option<CliError>>> = Arc::default();
    let sink = Arc::clone(&failure);
    let path = Arc::new(args.path);
    let error_path = Arc::clone(&path);

    let request = ApiRequest::<(), Value>::builder(move |(), cancel: CancellationToken| {
        let client = Arc::clone(&client);
        let path = Arc::clone(&path);
        let body = body.clone();
        async move {
            match body {
                Some(ref body) => client.post_json(&path, body, cancel).await,
                None => client.get_json(&path, cancel).await,
            }
        }
    })
    .on_error(move |err: &ApiError| {
        *sink.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(CliError::from_api(err, &error_path));
    })
    .build();

    let Some(data) = request.execute(()).await else {
        let reported = failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let message = request.snapshot().error.unwrap_or_default();
        return Err(reported.unwrap_or(CliError::Api {
            status: None,
            message,
        }));
    };

    let rendered = output::render_value(&global.output, &data)?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}
