//! Readiness gate.

use crate::member::Member;

/// True iff there is at least one member and every member is ready.
pub fn can_start(directory: &[Member]) -> bool {
    !directory.is_empty() && directory.iter().all(|m| m.ready)
}

/// `(ready, total)` member counts.
pub fn ready_count(directory: &[Member]) -> (usize, usize) {
    let ready = directory.iter().filter(|m| m.ready).count();
    (ready, directory.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_directory_cannot_start() {
        assert!(!can_start(&[]));
    }

    #[test]
    fn toggling_last_member_opens_gate() {
        let mut directory = vec![
            Member::new(1, "a", 1).with_ready(true),
            Member::new(2, "b", 2),
        ];
        assert!(!can_start(&directory));
        assert_eq!(ready_count(&directory), (1, 2));

        directory[1].ready = true;
        assert!(can_start(&directory));
        assert_eq!(ready_count(&directory), (2, 2));
    }
}
