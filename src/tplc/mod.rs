pub mod detail;
pub mod dom;
pub mod search;
pub mod synthetic;

#[cfg(test)]
pub mod testing;

use crate::settings::Settings;

/// Give a freshly loaded page time to finish rendering before it is read.
pub async fn settle(settings: &Settings) {
    let pause = settings.results_settle();
    if !pause.is_zero() {
        tokio::time::sleep(pause).await;
    }
}
