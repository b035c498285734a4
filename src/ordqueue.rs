use crate::error::CatResult;
use crossbeam_channel::{Receiver, Sender};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::iter::FusedIterator;

/// Where extraction and encode workers drop their results, tagged with the
/// position of the source or frame directory they worked on.
///
/// The phase reader gets them back in that order, so logs, progress and the
/// final report follow input order whatever `--jobs` is.
pub struct OrdQueue<T> {
    sender: Sender<ReverseTuple<T>>,
}

impl<T> Clone for OrdQueue<T> {
    #[inline]
    fn clone(&self) -> Self {
        Self { sender: self.sender.clone() }
    }
}

pub struct OrdQueueIter<T> {
    receiver: Receiver<ReverseTuple<T>>,
    next_index: usize,
    receive_buffer: BinaryHeap<ReverseTuple<T>>,
}

/// Unbounded: the reader is the thread that also feeds the workers, so a
/// bounded queue could stall both sides
pub fn new<T>() -> (OrdQueue<T>, OrdQueueIter<T>) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    (OrdQueue {
        sender,
    }, OrdQueueIter {
        receiver,
        next_index: 0,
        receive_buffer: BinaryHeap::new(),
    })
}

impl<T: Send> OrdQueue<T> {
    /// Each index from 0 up must be pushed exactly once
    #[inline]
    pub fn push(&self, index: usize, item: T) -> CatResult<()> {
        self.sender.send(ReverseTuple(index, item))?;
        Ok(())
    }
}

impl<T> FusedIterator for OrdQueueIter<T> {}

impl<T> Iterator for OrdQueueIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        while !self.receive_buffer.peek().is_some_and(|i| i.0 == self.next_index) {
            // once every worker is gone, the buffer drains lowest index first
            let Ok(item) = self.receiver.recv() else { break };
            self.receive_buffer.push(item);
        }
        let ReverseTuple(_, item) = self.receive_buffer.pop()?;
        self.next_index += 1;
        Some(item)
    }
}

/// Min-heap entry by position
struct ReverseTuple<T>(usize, T);
impl<T> PartialEq for ReverseTuple<T> {
    #[inline]
    fn eq(&self, o: &Self) -> bool { o.0.eq(&self.0) }
}
impl<T> Eq for ReverseTuple<T> {}
impl<T> PartialOrd for ReverseTuple<T> {
    #[inline]
    fn partial_cmp(&self, o: &Self) -> Option<Ordering> { Some(self.cmp(o)) }
}
impl<T> Ord for ReverseTuple<T> {
    #[inline]
    fn cmp(&self, o: &Self) -> Ordering { o.0.cmp(&self.0) }
}
