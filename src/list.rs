// The MIT License (MIT)

// Copyright (c) 2026 Routines Developers

//  Permission is hereby granted, free of charge, to any person obtaining a
//  copy of this software and associated documentation files (the "Software"),
//  to deal in the Software without restriction, including without limitation
//  the rights to use, copy, modify, merge, publish, distribute, sublicense,
//  and/or sell copies of the Software, and to permit persons to whom the
//  Software is furnished to do so, subject to the following conditions:
//
//  The above copyright notice and this permission notice shall be included in
//  all copies or substantial portions of the Software.
//
//  THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS
//  OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//  FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
//  AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
//  LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
//  FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
//  DEALINGS IN THE SOFTWARE.

//! FIFO lists of coroutines.
//!
//! The links live in the coroutine records themselves (`prev`/`next` in the
//! arena), a list is only a head/tail pair, and each parked coroutine carries
//! a tag naming the list that holds it. That keeps all three operations O(1),
//! including removing a coroutine from the middle when it is forcibly
//! unparked, without a pointer in sight.

use crate::arena::Arena;
use crate::coroutine::{Coroutine, Handle, Park};

/// Head and tail of a coroutine FIFO. Copied in and out of its owner around
/// link surgery, so it stays a plain pair of ids.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct CoroList {
    head: Option<Handle>,
    tail: Option<Handle>,
}

impl CoroList {
    pub(crate) fn new() -> CoroList {
        CoroList::default()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

/// Append to the tail. The coroutine must not be in any list.
pub(crate) fn push_back(coros: &mut Arena<Coroutine>, list: &mut CoroList, tag: Park, id: Handle) {
    {
        let coro = &mut coros[id.0];
        assert!(
            coro.parked.is_none() && coro.prev.is_none() && coro.next.is_none(),
            "coroutine is already in a queue"
        );
        coro.parked = Some(tag);
        coro.prev = list.tail;
    }

    match list.tail {
        Some(tail) => coros[tail.0].next = Some(id),
        None => list.head = Some(id),
    }
    list.tail = Some(id);
}

/// Detach and return the head, clearing its links and park tag.
pub(crate) fn pop_front(coros: &mut Arena<Coroutine>, list: &mut CoroList) -> Option<Handle> {
    let head = list.head?;

    let next = {
        let coro = &mut coros[head.0];
        let next = coro.next.take();
        coro.prev = None;
        coro.parked = None;
        next
    };

    list.head = next;
    match next {
        Some(next) => coros[next.0].prev = None,
        None => list.tail = None,
    }
    Some(head)
}

/// Detach a coroutine from anywhere in the list.
pub(crate) fn unlink(coros: &mut Arena<Coroutine>, list: &mut CoroList, id: Handle) {
    let (prev, next) = {
        let coro = &mut coros[id.0];
        (coro.prev.take(), coro.next.take())
    };
    coros[id.0].parked = None;

    match prev {
        Some(prev) => coros[prev.0].next = next,
        None => {
            debug_assert_eq!(list.head, Some(id));
            list.head = next;
        }
    }
    match next {
        Some(next) => coros[next.0].prev = prev,
        None => {
            debug_assert_eq!(list.tail, Some(id));
            list.tail = prev;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{pop_front, push_back, unlink, CoroList};
    use crate::arena::Arena;
    use crate::coroutine::{Coroutine, Handle, Park};

    fn three(coros: &mut Arena<Coroutine>) -> (Handle, Handle, Handle) {
        (
            Handle(coros.insert(Coroutine::stub())),
            Handle(coros.insert(Coroutine::stub())),
            Handle(coros.insert(Coroutine::stub())),
        )
    }

    #[test]
    fn fifo_order() {
        let mut coros = Arena::new();
        let (a, b, c) = three(&mut coros);
        let mut list = CoroList::new();

        push_back(&mut coros, &mut list, Park::Ready, a);
        push_back(&mut coros, &mut list, Park::Ready, b);
        push_back(&mut coros, &mut list, Park::Ready, c);
        assert_eq!(coros[a.0].parked, Some(Park::Ready));

        assert_eq!(pop_front(&mut coros, &mut list), Some(a));
        assert_eq!(pop_front(&mut coros, &mut list), Some(b));
        assert_eq!(pop_front(&mut coros, &mut list), Some(c));
        assert_eq!(pop_front(&mut coros, &mut list), None);
        assert!(list.is_empty());
        assert_eq!(coros[a.0].parked, None);
    }

    #[test]
    fn unlink_from_middle_and_ends() {
        let mut coros = Arena::new();
        let (a, b, c) = three(&mut coros);
        let mut list = CoroList::new();

        push_back(&mut coros, &mut list, Park::Ready, a);
        push_back(&mut coros, &mut list, Park::Ready, b);
        push_back(&mut coros, &mut list, Park::Ready, c);

        unlink(&mut coros, &mut list, b);
        assert_eq!(coros[b.0].parked, None);
        assert_eq!(pop_front(&mut coros, &mut list), Some(a));
        assert_eq!(pop_front(&mut coros, &mut list), Some(c));
        assert!(list.is_empty());

        // Sole element.
        push_back(&mut coros, &mut list, Park::Ready, b);
        unlink(&mut coros, &mut list, b);
        assert!(list.is_empty());
    }

    #[test]
    fn popped_coroutine_can_be_requeued() {
        let mut coros = Arena::new();
        let (a, b, _) = three(&mut coros);
        let mut list = CoroList::new();

        push_back(&mut coros, &mut list, Park::Ready, a);
        push_back(&mut coros, &mut list, Park::Ready, b);
        let popped = pop_front(&mut coros, &mut list).unwrap();

        // Links must be fully cleared or this push asserts.
        push_back(&mut coros, &mut list, Park::Ready, popped);
        assert_eq!(pop_front(&mut coros, &mut list), Some(b));
        assert_eq!(pop_front(&mut coros, &mut list), Some(a));
    }

    #[test]
    #[should_panic(expected = "already in a queue")]
    fn double_enqueue_asserts() {
        let mut coros = Arena::new();
        let (a, _, _) = three(&mut coros);
        let mut list = CoroList::new();

        push_back(&mut coros, &mut list, Park::Ready, a);
        push_back(&mut coros, &mut list, Park::Ready, a);
    }
}
