use tokio::select;
use tokio_util::sync::CancellationToken;

/// Ties the periodic tasks' cancellation to process teardown. In a browser
/// this would be page unload; for the console agent it is Ctrl-C.
pub async fn detect_shutdown(cancellation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancellation.cancel();
        },
    };
}
