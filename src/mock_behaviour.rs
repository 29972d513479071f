//! This module provides ways to tweak mocked planner servers, so that they can return errors on some tests
#![cfg(any(test, feature = "mock_remote"))]

use crate::error::RemoteError;

/// This stores some behaviour tweaks, that describe how a mocked server will behave during a given test
///
/// So that a functions fails _n_ times after _m_ initial successes, set `(m, n)` for the suited parameter
#[derive(Default, Clone, Debug)]
pub struct MockBehaviour {
    /// If this is true, every action will be allowed
    pub is_suspended: bool,

    pub create_task_behaviour: (u32, u32),
    pub delete_task_behaviour: (u32, u32),
    pub toggle_urgent_behaviour: (u32, u32),
    pub move_task_behaviour: (u32, u32),
    pub list_tasks_behaviour: (u32, u32),
}

impl MockBehaviour {
    pub fn new() -> Self {
        Self::default()
    }

    /// All requests will fail at once, for `n_fails` times
    pub fn fail_now(n_fails: u32) -> Self {
        Self {
            is_suspended: false,
            create_task_behaviour: (0, n_fails),
            delete_task_behaviour: (0, n_fails),
            toggle_urgent_behaviour: (0, n_fails),
            move_task_behaviour: (0, n_fails),
            list_tasks_behaviour: (0, n_fails),
        }
    }

    /// Suspend this mock behaviour until you call `resume`
    pub fn suspend(&mut self) {
        self.is_suspended = true;
    }
    /// Make this behaviour active again
    pub fn resume(&mut self) {
        self.is_suspended = false;
    }

    pub fn can_create_task(&mut self) -> Result<(), RemoteError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.create_task_behaviour, "create_task")
    }
    pub fn can_delete_task(&mut self) -> Result<(), RemoteError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.delete_task_behaviour, "delete_task")
    }
    pub fn can_toggle_urgent(&mut self) -> Result<(), RemoteError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.toggle_urgent_behaviour, "toggle_urgent")
    }
    pub fn can_move_task(&mut self) -> Result<(), RemoteError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.move_task_behaviour, "move_task")
    }
    pub fn can_list_tasks(&mut self) -> Result<(), RemoteError> {
        if self.is_suspended { return Ok(()) }
        decrement(&mut self.list_tasks_behaviour, "list_tasks")
    }
}


/// Return Ok(()) in case the value is `(1+, _)` or `(_, 0)`, or return Err and decrement otherwise
fn decrement(value: &mut (u32, u32), descr: &str) -> Result<(), RemoteError> {
    let remaining_successes = value.0;
    let remaining_failures = value.1;

    if remaining_successes > 0 {
        value.0 -= 1;
        log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
        Ok(())
    } else if remaining_failures > 0 {
        value.1 -= 1;
        log::debug!("Mock behaviour: failing a {} ({:?})", descr, value);
        Err(format!("Mocked behaviour requires this {} to fail this time. ({:?})", descr, value).into())
    } else {
        log::debug!("Mock behaviour: allowing a {} ({:?})", descr, value);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_mock_behaviour() {
        let mut ok = MockBehaviour::new();
        for _ in 0..5 {
            assert!(ok.can_create_task().is_ok());
            assert!(ok.can_list_tasks().is_ok());
        }

        let mut now = MockBehaviour::fail_now(2);
        assert!(now.can_delete_task().is_err());
        assert!(now.can_move_task().is_err());
        assert!(now.can_move_task().is_err());
        assert!(now.can_delete_task().is_err());
        assert!(now.can_delete_task().is_ok());
        assert!(now.can_move_task().is_ok());
        assert!(now.can_toggle_urgent().is_err());

        let mut custom = MockBehaviour{
            toggle_urgent_behaviour: (0,1),
            create_task_behaviour: (1,3),
            ..MockBehaviour::default()
        };
        assert!(custom.can_toggle_urgent().is_err());
        assert!(custom.can_toggle_urgent().is_ok());
        assert!(custom.can_toggle_urgent().is_ok());
        assert!(custom.can_create_task().is_ok());
        assert!(custom.can_create_task().is_err());
        assert!(custom.can_create_task().is_err());
        assert!(custom.can_create_task().is_err());
        assert!(custom.can_create_task().is_ok());

        let mut suspended = MockBehaviour::fail_now(1);
        suspended.suspend();
        assert!(suspended.can_list_tasks().is_ok());
        suspended.resume();
        assert!(suspended.can_list_tasks().is_err());
    }
}
