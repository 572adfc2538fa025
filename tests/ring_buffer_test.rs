use cairn::{Error, OwnedString, RingBuffer};
use std::cell::Cell;
use std::rc::Rc;

struct Counted(Rc<Cell<usize>>);

impl Drop for Counted {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

#[test]
fn test_eviction_drops_oldest() {
    let drops = Rc::new(Cell::new(0));
    let mut rb: RingBuffer<Counted, 2> = RingBuffer::new().unwrap();
    rb.emplace_back(|| Counted(drops.clone()));
    rb.emplace_back(|| Counted(drops.clone()));
    assert_eq!(drops.get(), 0);
    rb.emplace_back(|| Counted(drops.clone()));
    assert_eq!(drops.get(), 1);
    rb.flush();
    assert_eq!(drops.get(), 3);
    assert!(rb.is_empty());
}

#[test]
fn test_wraparound_order() {
    let mut rb: RingBuffer<u32, 4> = RingBuffer::new().unwrap();
    rb.write(&[1, 2, 3, 4, 5, 6]);
    assert_eq!(rb.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5, 6]);
    assert_eq!(rb.pop_front(), Some(3));
    rb.push_back(7);
    let (a, b) = rb.as_slices();
    assert_eq!([a, b].concat(), vec![4, 5, 6, 7]);
    *rb.get_mut(0).unwrap() = 40;
    assert_eq!(rb.get(0), Ok(&40));
    assert_eq!(rb.get(4), Err(Error::out_of_range(4, 4)));
}

#[test]
fn test_seek_then_write() {
    let mut rb: RingBuffer<char, 3> = RingBuffer::new().unwrap();
    rb.write(&['a', 'b', 'c', 'd']);
    rb.seek(2).unwrap();
    rb.push_back('x');
    assert_eq!(rb.iter().collect::<String>(), "bcx");
    rb.seek(0).unwrap();
    assert!(rb.is_empty());
}

#[test]
fn test_drop_releases_remaining() {
    let drops = Rc::new(Cell::new(0));
    {
        let mut rb: RingBuffer<Counted, 8> = RingBuffer::new().unwrap();
        for _ in 0..5 {
            rb.push_back(Counted(drops.clone()));
        }
    }
    assert_eq!(drops.get(), 5);
}

#[test]
fn test_string_in_ring_buffer() {
    let mut rb: RingBuffer<OwnedString, 2> = RingBuffer::new().unwrap();
    for word in ["one", "two", "three"] {
        rb.push_back(word.parse().unwrap());
    }
    assert_eq!(rb.get(0).unwrap(), "two");
    assert_eq!(format!("{rb:?}"), r#"["two", "three"]"#);
}
