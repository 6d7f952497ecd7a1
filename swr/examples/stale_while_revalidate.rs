use fibre_swr::driver::memory::MemoryDriver;
use fibre_swr::{CacheBuilder, Manager};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
struct Data {
  version: usize,
  content: String,
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  let load_counter = Arc::new(AtomicUsize::new(0));
  let loader = {
    let counter = load_counter.clone();
    move |key: String| {
      let version = counter.fetch_add(1, Ordering::SeqCst) + 1;
      println!("[Loader] Loading version {} for key '{}'...", version, key);
      thread::sleep(Duration::from_millis(500)); // Simulate slow load
      Ok::<_, Infallible>(Data {
        version,
        content: format!("Content for {} - version {}", key, version),
      })
    }
  };

  let manager = Manager::new();
  manager
    .add([CacheBuilder::new("documents")
      .fresh_for(Duration::from_secs(2))
      .lifetime(Duration::from_secs(10))
      .tag("content")
      .driver(MemoryDriver::new())
      .build()
      .expect("Failed to build cache")])
    .expect("Failed to register cache");
  let cache = manager.get("documents").expect("cache is registered");

  let key = "my-data".to_string();
  let mut value = Data::default();

  println!("--- Step 1: Initial Load (miss) ---");
  cache.get(key.clone(), &mut value, loader.clone()).unwrap();
  println!("Received: {:?}", value);
  assert_eq!(value.version, 1);

  println!("\n--- Step 2: Cache Hit (Fresh) ---");
  cache.get(key.clone(), &mut value, loader.clone()).unwrap();
  println!("Received: {:?}", value);
  assert_eq!(load_counter.load(Ordering::Relaxed), 1);

  println!("\n--- Step 3: Wait for the fresh window to pass (3 seconds) ---");
  thread::sleep(Duration::from_secs(3));

  println!("\n--- Step 4: Stale Read ---");
  cache.get(key.clone(), &mut value, loader.clone()).unwrap();
  println!("IMMEDIATELY Received (stale): {:?}", value);
  assert_eq!(value.version, 1, "Should return stale version 1 immediately");
  println!("Refresh in flight: {}", cache.is_refreshing(&key));

  println!("\n--- Step 5: Wait for Background Refresh to Complete ---");
  thread::sleep(Duration::from_secs(1));
  assert_eq!(load_counter.load(Ordering::Relaxed), 2);

  println!("\n--- Step 6: Final Read (Fresh) ---");
  cache.get(key.clone(), &mut value, loader.clone()).unwrap();
  println!("Received (refreshed): {:?}", value);
  assert_eq!(value.version, 2, "Should now have the refreshed version 2");

  println!("\n--- Step 7: Invalidate by tag ---");
  let matched = manager.invalidate_tags(["content"]);
  println!("Caches invalidated: {}", matched);
  cache.get(key, &mut value, loader).unwrap();
  assert_eq!(value.version, 3);

  println!("\nCache metrics: {:#?}", cache.metrics());
}
