//! Sweep phase.

use crate::heap::{Arena, FreeList, Registry};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepResult {
    /// Objects returned to the free list.
    pub objects_reclaimed: usize,
    /// Bytes returned to the free list, headers included.
    pub bytes_reclaimed: usize,
    /// Objects that were marked and kept.
    pub objects_surviving: usize,
    /// Bytes held by surviving objects.
    pub bytes_surviving: usize,
    /// Free spans merged afterwards.
    pub blocks_coalesced: usize,
}

/// Reclaim every unmarked object, clear marks on survivors, then coalesce.
pub fn sweep(arena: &mut Arena, registry: &mut Registry, free: &mut FreeList) -> SweepResult {
    let mut result = SweepResult::default();
    let mut surviving = (0usize, 0usize);

    registry.retain(
        |object| {
            if object.is_marked() {
                object.set_marked(false);
                surviving.0 += 1;
                surviving.1 += object.span();
                true
            } else {
                false
            }
        },
        |object| {
            let span = object.span();
            arena.credit(span);
            result.objects_reclaimed += 1;
            result.bytes_reclaimed += span;
            // SAFETY: the object is unlinked, so its span is unused arena memory.
            unsafe { free.release(object.header().cast::<u8>(), span) };
        },
    );

    result.objects_surviving = surviving.0;
    result.bytes_surviving = surviving.1;
    result.blocks_coalesced = free.coalesce();
    crate::tracing::internal::log_coalesced(result.blocks_coalesced, free.len());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{Object, HEADER_SIZE};

    fn setup(payloads: &[usize]) -> (Arena, FreeList, Registry, Vec<Object>) {
        let mut arena = Arena::map(8 * 1024).unwrap();
        let mut free = unsafe { FreeList::from_region(arena.base(), arena.size()) };
        let mut registry = Registry::new();
        let objects: Vec<Object> = payloads
            .iter()
            .map(|&payload| {
                let (span, granted) = free.acquire(HEADER_SIZE + payload).unwrap();
                let object = unsafe { Object::init(span, granted - HEADER_SIZE) };
                registry.push(object);
                arena.charge(granted);
                object
            })
            .collect();
        (arena, free, registry, objects)
    }

    #[test]
    fn test_sweep_reclaims_unmarked_and_clears_marks() {
        let (mut arena, mut free, mut registry, objects) = setup(&[16, 32, 48]);
        objects[1].set_marked(true);
        let survivor_span = objects[1].span();

        let result = sweep(&mut arena, &mut registry, &mut free);

        assert_eq!(result.objects_reclaimed, 2);
        assert_eq!(result.objects_surviving, 1);
        assert_eq!(result.bytes_surviving, survivor_span);
        assert_eq!(arena.used(), survivor_span);
        assert_eq!(registry.len(), 1);
        assert!(!objects[1].is_marked());
    }

    #[test]
    fn test_sweep_coalesces_with_tail() {
        let (mut arena, mut free, mut registry, objects) = setup(&[16, 16, 16]);
        objects[0].set_marked(true);

        sweep(&mut arena, &mut registry, &mut free);

        // Objects 1 and 2 merge with the untouched tail of the arena.
        assert_eq!(free.len(), 1);
        assert_eq!(free.free_bytes(), arena.size() - objects[0].span());
    }

    #[test]
    fn test_sweep_everything_restores_single_block() {
        let (mut arena, mut free, mut registry, _) = setup(&[8, 24, 40, 56]);

        let result = sweep(&mut arena, &mut registry, &mut free);

        assert_eq!(result.objects_reclaimed, 4);
        assert!(registry.is_empty());
        assert_eq!(arena.used(), 0);
        assert_eq!(free.len(), 1);
        assert_eq!(free.free_bytes(), arena.size());
    }
}
