//! Registry behaviour across aliases and threads.

use souffle_host_loader::{ArtifactIdentity, LoadError, LoadPrimitive, NativeLoader};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

/// Counts loads and sleeps inside the critical section to widen races.
#[derive(Default)]
struct SlowCountingLoader {
    loads: AtomicUsize,
}

impl LoadPrimitive for SlowCountingLoader {
    fn load(&self, _identity: &ArtifactIdentity) -> Result<(), LoadError> {
        thread::sleep(Duration::from_millis(20));
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn touch(path: &Path) {
    std::fs::write(path, b"").unwrap();
}

#[cfg(unix)]
#[test]
fn test_symlink_is_same_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("prog.so");
    let alias = dir.path().join("alias.so");
    touch(&artifact);
    std::os::unix::fs::symlink(&artifact, &alias).unwrap();

    let counter = Arc::new(SlowCountingLoader::default());
    let loader = NativeLoader::new(counter.clone());
    loader.ensure_loaded(&artifact).unwrap();
    let via_alias = loader.ensure_loaded(&alias).unwrap();

    assert_eq!(counter.loads.load(Ordering::SeqCst), 1);
    assert_eq!(via_alias, ArtifactIdentity::resolve(&artifact).unwrap());
}

#[cfg(unix)]
#[test]
fn test_hard_link_is_same_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("prog.so");
    let link = dir.path().join("copy.so");
    touch(&artifact);
    std::fs::hard_link(&artifact, &link).unwrap();

    let counter = Arc::new(SlowCountingLoader::default());
    let loader = NativeLoader::new(counter.clone());
    loader.ensure_loaded(&artifact).unwrap();
    loader.ensure_loaded(&link).unwrap();

    assert_eq!(counter.loads.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_callers_load_once() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("prog.so");
    touch(&artifact);

    let counter = Arc::new(SlowCountingLoader::default());
    let loader = Arc::new(NativeLoader::new(counter.clone()));
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let loader = Arc::clone(&loader);
            let barrier = Arc::clone(&barrier);
            let artifact = artifact.clone();
            thread::spawn(move || {
                barrier.wait();
                loader.ensure_loaded(&artifact).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(counter.loads.load(Ordering::SeqCst), 1);
    assert_eq!(loader.loaded().len(), 1);
}
