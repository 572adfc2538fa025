use cairn::alloc::{ConcurrentMonotonicResource, LazyAllocator, MonotonicResource, Resource};
use cairn::{ArenaStats, Error, SharedPtr, UnconfiguredArrayResource, UniquePtr};
use parking_lot::Mutex;
use std::cell::Cell;
use std::collections::HashSet;
use std::ptr::NonNull;
use std::rc::Rc;

struct Counted(Rc<Cell<usize>>);

impl Drop for Counted {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[test]
fn test_freed_slots_are_reused_lifo() {
    let arena: LazyAllocator<u64, 16> = LazyAllocator::new();
    let ptrs: Vec<NonNull<u64>> = (0..10).map(|i| arena.alloc(i).unwrap()).collect();

    for &i in &[2, 5, 7] {
        unsafe { arena.dealloc(ptrs[i]).unwrap() };
    }
    assert_eq!(arena.live(), 7);
    assert_eq!(arena.free_slots(), 3);

    let again: Vec<NonNull<u64>> = (0..3).map(|i| arena.alloc(100 + i).unwrap()).collect();
    assert_eq!(again, vec![ptrs[7], ptrs[5], ptrs[2]]);
    assert_eq!(arena.free_slots(), 0);
    assert_eq!(arena.page_count(), 1);
}

#[test]
fn test_pages_appended_when_full() {
    let arena: LazyAllocator<u32, 4> = LazyAllocator::new();
    let ptrs: Vec<_> = (0..9).map(|i| arena.alloc(i).unwrap()).collect();
    assert_eq!(arena.page_count(), 3);

    // Every slot is distinct and holds its own value.
    let unique: HashSet<_> = ptrs.iter().copied().collect();
    assert_eq!(unique.len(), 9);
    for (i, p) in ptrs.iter().enumerate() {
        assert_eq!(unsafe { *p.as_ref() }, i as u32);
        assert!(arena.owns(*p));
    }

    assert_eq!(
        arena.stats(),
        ArenaStats {
            pages: 3,
            slot_capacity: 4,
            live: 9,
            free_slots: 0,
            high_water: 9,
        }
    );
}

#[test]
fn test_free_list_is_drained_before_new_slots() {
    let arena: LazyAllocator<u32, 2> = LazyAllocator::new();
    let a = arena.alloc(1).unwrap();
    let _b = arena.alloc(2).unwrap();
    unsafe { arena.dealloc(a).unwrap() };
    // The page is full; the freed slot is still reused without a new page.
    assert_eq!(arena.alloc(3).unwrap(), a);
    assert_eq!(arena.page_count(), 1);
}

#[test]
fn test_live_objects_dropped_with_arena() {
    let drops = Rc::new(Cell::new(0));
    {
        let arena: LazyAllocator<Counted, 3> = LazyAllocator::new();
        let ptrs: Vec<_> = (0..5).map(|_| arena.alloc(Counted(drops.clone())).unwrap()).collect();
        unsafe { arena.dealloc(ptrs[1]).unwrap() };
        assert_eq!(drops.get(), 1);
    }
    assert_eq!(drops.get(), 5);
}

#[test]
fn test_live_objects_leaked_without_drop_live() {
    let drops = Rc::new(Cell::new(0));
    {
        let arena: LazyAllocator<Counted, 3, false> = LazyAllocator::new();
        for _ in 0..4 {
            arena.alloc(Counted(drops.clone())).unwrap();
        }
    }
    assert_eq!(drops.get(), 0);
}

#[test]
fn test_reset_drops_live_and_starts_over() {
    let drops = Rc::new(Cell::new(0));
    let mut arena: LazyAllocator<Counted, 2> = LazyAllocator::new();
    for _ in 0..3 {
        arena.alloc(Counted(drops.clone())).unwrap();
    }
    arena.reset();
    assert_eq!(drops.get(), 3);
    assert_eq!(arena.page_count(), 0);
    assert_eq!(arena.live(), 0);
}

#[test]
fn test_page_allocation_failure_drops_value() {
    let drops = Rc::new(Cell::new(0));
    let arena: LazyAllocator<Counted, 8, true, UnconfiguredArrayResource> =
        LazyAllocator::new_in(UnconfiguredArrayResource);
    let err = arena.alloc(Counted(drops.clone())).unwrap_err();
    assert!(err.is_alloc_failure());
    assert_eq!(drops.get(), 1);
    assert_eq!(arena.live(), 0);
}

#[test]
fn test_unbalanced_dealloc_is_rejected() {
    let arena: LazyAllocator<u8, 4> = LazyAllocator::new();
    let p = arena.alloc(1).unwrap();
    unsafe {
        arena.dealloc_raw(p).unwrap();
        assert!(matches!(arena.dealloc_raw(p), Err(Error::InvalidOperation(_))));
    }
}

#[test]
fn test_handles_over_monotonic_resource() {
    let drops = Rc::new(Cell::new(0));
    let arena: LazyAllocator<Counted, 8> = LazyAllocator::new();
    let res = MonotonicResource::new(&arena);
    {
        let a = UniquePtr::new_in(Counted(drops.clone()), res).unwrap();
        let b = UniquePtr::new_in(Counted(drops.clone()), res).unwrap();
        assert_eq!(arena.live(), 2);
        drop(a);
        assert_eq!(arena.free_slots(), 1);
        assert_eq!(drops.get(), 1);
        assert!(!b.is_null());
    }
    assert_eq!(drops.get(), 2);
    assert_eq!(arena.live(), 0);
}

#[test]
fn test_shared_ptr_with_arena_count_cells() {
    use cairn::LocalCount;

    let values: LazyAllocator<String, 4> = LazyAllocator::new();
    let counts: LazyAllocator<LocalCount, 4> = LazyAllocator::new();
    let a = SharedPtr::new_in(
        "arena".to_owned(),
        MonotonicResource::new(&values),
        MonotonicResource::new(&counts),
    )
    .unwrap();
    let b = a.clone();
    assert_eq!(counts.live(), 1);
    drop(a);
    assert_eq!(values.live(), 1);
    drop(b);
    assert_eq!(values.live(), 0);
    assert_eq!(counts.live(), 0);
}

#[test]
fn test_concurrent_resource_across_threads() {
    const THREADS: usize = 4;
    const PER_THREAD: usize = 200;

    let arena = Mutex::new(LazyAllocator::<u64, 32>::new());
    let res = ConcurrentMonotonicResource::new(&arena);

    crossbeam_utils::thread::scope(|s| {
        for t in 0..THREADS {
            s.spawn(move |_| {
                let ptrs: Vec<_> = (0..PER_THREAD)
                    .map(|i| res.allocate((t * PER_THREAD + i) as u64).unwrap())
                    .collect();
                for (i, p) in ptrs.iter().enumerate() {
                    assert_eq!(unsafe { *p.as_ref() }, (t * PER_THREAD + i) as u64);
                }
                for p in ptrs {
                    unsafe { res.deallocate(p) };
                }
            });
        }
    })
    .unwrap();

    let arena = arena.into_inner();
    assert_eq!(arena.live(), 0);
    assert_eq!(arena.free_slots(), arena.stats().high_water);
}

#[test]
fn test_stats_serialize_as_json() {
    let arena: LazyAllocator<u16, 8> = LazyAllocator::new();
    arena.alloc(1).unwrap();
    let json = serde_json::to_string(&arena.stats()).unwrap();
    assert!(json.contains("\"pages\":1"));
    let back: ArenaStats = serde_json::from_str(&json).unwrap();
    assert_eq!(back, arena.stats());
}
