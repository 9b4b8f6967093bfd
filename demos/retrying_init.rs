use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use poly_lazy::{CancellationToken, Lazy, Options, Retry};
use tokio::time::{sleep, Instant};

#[tokio::main]
async fn main() {
   tracing_subscriber::fmt()
      .with_env_filter(
         tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("poly_lazy=debug")),
      )
      .init();

   let attempts = Arc::new(AtomicUsize::new(0));
   let counter = Arc::clone(&attempts);

   let scope = CancellationToken::new();
   let service = Lazy::with_options(
      &scope,
      move |_token| {
         let attempt = counter.fetch_add(1, Ordering::SeqCst) + 1;
         async move {
            println!("Connecting (attempt {attempt})...");
            if attempt < 3 {
               Err(std::io::Error::other("connection refused"))
            } else {
               Ok(format!("connected after {attempt} attempts"))
            }
         }
      },
      Options::new().with_retry(Retry::exponential(
         Duration::from_millis(20),
         Duration::from_millis(200),
      )),
   );

   // The first read reports the first failure while retries continue.
   match service.get(&CancellationToken::new()).await {
      Ok(value) => println!("Got: {value}"),
      Err(e) => println!("Not ready yet: {e}"),
   }

   sleep(Duration::from_millis(200)).await;

   let deadline = Instant::now() + Duration::from_millis(100);
   match service.get_deadline(deadline).await {
      Ok(value) => println!("Got: {value}"),
      Err(e) => println!("Still failing: {e}"),
   }

   scope.cancel();
}
