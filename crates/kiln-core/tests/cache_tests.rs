//! Cache behavior across threads and process restarts.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;

use kiln_core::cache::{compute_key, CacheEntry, CompileCache};
use kiln_core::compiler::{CompileRequest, CompiledStyle, InlineCompiler, StylesheetCompiler};
use kiln_core::{
    BatchContext, BuildOptions, BuildTarget, CompilerError, FileSet, SourceFile,
};

struct CountingCompiler {
    inner: InlineCompiler,
    calls: AtomicUsize,
}

impl CountingCompiler {
    fn new() -> Self {
        Self {
            inner: InlineCompiler::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl StylesheetCompiler for CountingCompiler {
    fn compile(&self, request: &CompileRequest) -> Result<CompiledStyle, CompilerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.compile(request)
    }
}

fn file(path: &str, content: &str) -> SourceFile {
    SourceFile::new(path, content, BuildTarget::Neutral, true)
}

#[test]
fn test_concurrent_requesters_share_one_compute() {
    const THREADS: usize = 8;

    let cache = CompileCache::new();
    let entry = file("/app/main.scss", ".a {}");
    let key = compute_key(&entry, &[], &BuildOptions::default());
    let computes = AtomicUsize::new(0);
    let barrier = Barrier::new(THREADS);

    std::thread::scope(|scope| {
        let mut handles = Vec::new();
        for _ in 0..THREADS {
            handles.push(scope.spawn(|| {
                barrier.wait();
                cache.get_or_compute(&key, || {
                    computes.fetch_add(1, Ordering::SeqCst);
                    // Hold the in-flight slot long enough for the other
                    // requesters to arrive while the compile is running.
                    std::thread::sleep(std::time::Duration::from_millis(50));
                    CacheEntry::success(key.clone(), ".a {}\n".into(), None, vec![])
                })
            }));
        }

        let results: Vec<CacheEntry> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(computes.load(Ordering::SeqCst), 1);
        for entry in &results {
            assert_eq!(entry.css, results[0].css);
            assert_eq!(entry.cached_at, results[0].cached_at);
        }
    });
}

#[test]
fn test_distinct_keys_compute_independently() {
    let cache = CompileCache::new();
    let options = BuildOptions::default();
    let key_a = compute_key(&file("/app/a.scss", ".a {}"), &[], &options);
    let key_b = compute_key(&file("/app/b.scss", ".b {}"), &[], &options);

    let a = cache.get_or_compute(&key_a, || {
        CacheEntry::success(key_a.clone(), "a".into(), None, vec![])
    });
    let b = cache.get_or_compute(&key_b, || {
        CacheEntry::success(key_b.clone(), "b".into(), None, vec![])
    });

    assert_eq!(a.css.as_deref(), Some("a"));
    assert_eq!(b.css.as_deref(), Some("b"));
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_cache_survives_context_restart() {
    let dir = tempfile::TempDir::new().unwrap();
    let files: FileSet = [
        file("/app/main.scss", "@import \"dep\";"),
        file("/app/_dep.scss", ".dep {}"),
    ]
    .into_iter()
    .collect();

    let compiler = CountingCompiler::new();
    {
        let mut ctx = BatchContext::with_disk_cache(dir.path(), BuildOptions::default());
        let outcome = ctx.run_batch(&files, BuildTarget::Neutral, &compiler);
        assert!(!outcome.results[0].from_cache);
    }
    assert_eq!(compiler.calls(), 1);

    let mut ctx = BatchContext::with_disk_cache(dir.path(), BuildOptions::default());
    let outcome = ctx.run_batch(&files, BuildTarget::Neutral, &compiler);
    assert!(outcome.results[0].from_cache, "restart must serve from disk");
    assert_eq!(compiler.calls(), 1, "no recompilation after restart");
}

#[test]
fn test_failed_unit_survives_restart_without_recompiling() {
    let dir = tempfile::TempDir::new().unwrap();
    let files: FileSet = [file("/app/broken.scss", ".a {")].into_iter().collect();

    let compiler = CountingCompiler::new();
    {
        let mut ctx = BatchContext::with_disk_cache(dir.path(), BuildOptions::default());
        let outcome = ctx.run_batch(&files, BuildTarget::Neutral, &compiler);
        assert!(outcome.results[0].outcome.is_err());
    }

    let mut ctx = BatchContext::with_disk_cache(dir.path(), BuildOptions::default());
    let outcome = ctx.run_batch(&files, BuildTarget::Neutral, &compiler);
    assert!(outcome.results[0].from_cache);
    assert!(outcome.results[0].outcome.is_err());
    assert_eq!(compiler.calls(), 1);
}

#[test]
fn test_corrupted_manifest_falls_back_to_full_recompile() {
    let dir = tempfile::TempDir::new().unwrap();
    let files: FileSet = [file("/app/main.scss", ".a {}")].into_iter().collect();

    let compiler = CountingCompiler::new();
    {
        let mut ctx = BatchContext::with_disk_cache(dir.path(), BuildOptions::default());
        ctx.run_batch(&files, BuildTarget::Neutral, &compiler);
    }
    assert_eq!(compiler.calls(), 1);

    let manifest = dir.path().join(".kiln-cache").join("manifest.bin");
    std::fs::write(&manifest, b"garbage").unwrap();

    let mut ctx = BatchContext::with_disk_cache(dir.path(), BuildOptions::default());
    let outcome = ctx.run_batch(&files, BuildTarget::Neutral, &compiler);
    assert!(outcome.results[0].outcome.is_ok(), "corruption is never fatal");
    assert!(!outcome.results[0].from_cache);
    assert_eq!(compiler.calls(), 2);
}

#[test]
fn test_contexts_do_not_share_in_memory_state() {
    let files: FileSet = [file("/app/main.scss", ".a {}")].into_iter().collect();

    let compiler = CountingCompiler::new();
    let mut first = BatchContext::new(BuildOptions::default());
    first.run_batch(&files, BuildTarget::Neutral, &compiler);

    let mut second = BatchContext::new(BuildOptions::default());
    let outcome = second.run_batch(&files, BuildTarget::Neutral, &compiler);

    assert!(!outcome.results[0].from_cache);
    assert_eq!(compiler.calls(), 2);
}

#[test]
fn test_deleted_file_restores_old_key_from_cache() {
    let mut files: FileSet = [
        file("/app/main.scss", "@import \"extra\";\n.a {}"),
        file("/app/_extra.scss", ".extra {}"),
    ]
    .into_iter()
    .collect();

    let compiler = CountingCompiler::new();
    let mut ctx = BatchContext::new(BuildOptions::default());
    let with_dep = ctx.run_batch(&files, BuildTarget::Neutral, &compiler);
    assert!(with_dep.results[0].outcome.is_ok());

    // Deleting the partial turns the import into a resolution failure.
    files.remove(&PathBuf::from("/app/_extra.scss"));
    let without = ctx.run_batch(&files, BuildTarget::Neutral, &compiler);
    assert!(without.results[0].outcome.is_err());

    // Restoring it brings back the old key, served from cache.
    files.insert(file("/app/_extra.scss", ".extra {}"));
    let restored = ctx.run_batch(&files, BuildTarget::Neutral, &compiler);
    assert_eq!(restored.results[0].key, with_dep.results[0].key);
    assert!(restored.results[0].from_cache);
    assert_eq!(compiler.calls(), 1);
}
