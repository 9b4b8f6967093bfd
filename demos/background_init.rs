use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use poly_lazy::{CancellationToken, Lazy};
use tokio::time::sleep;

static COUNTER: AtomicUsize = AtomicUsize::new(0);

#[tokio::main]
async fn main() {
   tracing_subscriber::fmt()
      .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
      .init();

   let scope = CancellationToken::new();
   let data = Lazy::new(&scope, |_token| async {
      // This runs once, in the background, as soon as the value is created
      COUNTER.fetch_add(1, Ordering::Relaxed);
      println!("Initializing data...");
      sleep(Duration::from_millis(50)).await;
      Ok::<_, std::io::Error>("Expensive data".to_string())
   });

   let tasks: Vec<_> = (0..5)
      .map(|i| {
         let data = data.clone();
         tokio::spawn(async move {
            let value = data.get(&CancellationToken::new()).await.unwrap();
            println!("Task {i} access: {value}");
         })
      })
      .collect();

   for t in tasks {
      t.await.unwrap();
   }

   assert_eq!(COUNTER.load(Ordering::Relaxed), 1); // Factory ran only once
   println!("State: {:?}", data.state());
}
