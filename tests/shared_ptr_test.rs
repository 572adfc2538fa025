#![cfg(not(loom))]

use cairn::{ConcurrentPtr, SharedPtr};
use std::cell::Cell;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct DropCounter(Rc<Cell<usize>>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

struct AtomicDropCounter(Arc<AtomicUsize>);

impl Drop for AtomicDropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_copies_outlive_original() {
    let a: SharedPtr<i32> = SharedPtr::new(42).unwrap();
    let b = a.clone();
    let c = b.clone();
    assert_eq!(c.use_count(), 3);
    drop(a);
    drop(b);
    assert_eq!(*c, 42);
    assert_eq!(c.use_count(), 1);
    drop(c);
}

#[test]
fn test_clones_dropped_in_any_order_free_once() {
    const N: usize = 8;

    for rotation in 0..N {
        let drops = Rc::new(Cell::new(0));
        let first: SharedPtr<DropCounter> = SharedPtr::new(DropCounter(drops.clone())).unwrap();
        let mut handles: Vec<_> = (1..N).map(|_| first.clone()).collect();
        handles.push(first);
        handles.rotate_left(rotation);

        let last = handles.pop().unwrap();
        for h in handles {
            drop(h);
            assert_eq!(drops.get(), 0);
        }
        assert_eq!(last.use_count(), 1);
        drop(last);
        assert_eq!(drops.get(), 1);
    }
}

#[test]
fn test_take_moves_share_without_count_change() {
    let mut a: SharedPtr<String> = SharedPtr::new("moved".to_owned()).unwrap();
    let b = a.clone();
    let c = a.take();
    assert!(a.is_null());
    assert_eq!(b.use_count(), 2);
    assert!(SharedPtr::ptr_eq(&b, &c));
}

#[test]
fn test_equality_compares_values() {
    let a: SharedPtr<u8> = SharedPtr::new(1).unwrap();
    let b: SharedPtr<u8> = SharedPtr::new(1).unwrap();
    let c: SharedPtr<u8> = SharedPtr::new(2).unwrap();
    assert_eq!(a, b);
    assert!(!SharedPtr::ptr_eq(&a, &b));
    assert_ne!(a, c);
    assert_ne!(a, SharedPtr::default());
}

#[test]
fn test_display_and_debug_delegate() {
    let a: SharedPtr<f32> = SharedPtr::new(1.5).unwrap();
    assert_eq!(a.to_string(), "1.5");
    assert_eq!(format!("{a:?}"), "SharedPtr { value: Some(1.5), use_count: 1 }");
}

#[test]
#[should_panic(expected = "null SharedPtr")]
fn test_null_deref_panics() {
    let a: ConcurrentPtr<u8> = ConcurrentPtr::default();
    let _ = *a;
}

#[test]
fn test_concurrent_ptr_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<ConcurrentPtr<String>>();
}

#[test]
fn test_concurrent_drops_destroy_exactly_once() {
    const THREADS: usize = 8;

    for _ in 0..200 {
        let drops = Arc::new(AtomicUsize::new(0));
        let original = ConcurrentPtr::new(AtomicDropCounter(drops.clone())).unwrap();
        let clones: Vec<_> = (0..THREADS).map(|_| original.clone()).collect();
        drop(original);

        crossbeam_utils::thread::scope(|s| {
            for handle in clones {
                s.spawn(move |_| {
                    assert!(handle.use_count() >= 1);
                    drop(handle);
                });
            }
        })
        .unwrap();

        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }
}

#[test]
fn test_concurrent_clones_from_shared_reference() {
    let drops = Arc::new(AtomicUsize::new(0));
    let root = ConcurrentPtr::new(AtomicDropCounter(drops.clone())).unwrap();

    crossbeam_utils::thread::scope(|s| {
        for _ in 0..4 {
            s.spawn(|_| {
                for _ in 0..1000 {
                    let local = root.clone();
                    drop(local);
                }
            });
        }
    })
    .unwrap();

    assert_eq!(root.use_count(), 1);
    drop(root);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}
