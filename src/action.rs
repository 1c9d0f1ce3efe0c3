//! Abstract input actions
//!
//! Menu items carry a single integer identifier. Fixed commands occupy the
//! codes below [`BOOT_BASE`]; boot catalog entry `N` is encoded as
//! `BOOT_BASE + N`.

/// First action code used for boot catalog entries
pub const BOOT_BASE: i32 = 100;

/// Action produced by the input source or stored in a menu item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    /// Nothing happened (unknown key, spurious wakeup)
    None,
    Up,
    Down,
    /// Confirm the highlighted item
    Select,
    /// Enter the highlighted item's submenu
    Submenu,
    /// Return to the parent menu level
    ParentMenu,
    Rescan,
    Reboot,
    Shutdown,
    /// Switch to the debug text view
    Debug,
    Exit,
    Error,
    Timeout,
    /// Boot catalog entry with the given index
    Boot(usize),
}

impl Action {
    /// Integer code of the action
    pub const fn code(self) -> i32 {
        match self {
            Action::None => 0,
            Action::Up => 1,
            Action::Down => 2,
            Action::Select => 3,
            Action::Submenu => 4,
            Action::ParentMenu => 5,
            Action::Rescan => 6,
            Action::Reboot => 7,
            Action::Shutdown => 8,
            Action::Debug => 9,
            Action::Exit => 10,
            Action::Error => 11,
            Action::Timeout => 12,
            Action::Boot(index) => BOOT_BASE + index as i32,
        }
    }

    /// Decode an integer code. Unknown codes below [`BOOT_BASE`] yield `None`.
    pub fn from_code(code: i32) -> Option<Self> {
        let action = match code {
            0 => Action::None,
            1 => Action::Up,
            2 => Action::Down,
            3 => Action::Select,
            4 => Action::Submenu,
            5 => Action::ParentMenu,
            6 => Action::Rescan,
            7 => Action::Reboot,
            8 => Action::Shutdown,
            9 => Action::Debug,
            10 => Action::Exit,
            11 => Action::Error,
            12 => Action::Timeout,
            c if c >= BOOT_BASE => Action::Boot((c - BOOT_BASE) as usize),
            _ => return None,
        };
        Some(action)
    }

    /// Catalog index carried by a boot action
    pub fn boot_index(self) -> Option<usize> {
        match self {
            Action::Boot(index) => Some(index),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_code_offset() {
        for i in [0usize, 1, 7, 250] {
            let code = Action::Boot(i).code();
            assert_eq!(code, BOOT_BASE + i as i32);
            assert_eq!(Action::from_code(code), Some(Action::Boot(i)));
        }
    }

    #[test]
    fn test_fixed_codes_stay_below_base() {
        let fixed = [
            Action::None,
            Action::Up,
            Action::Down,
            Action::Select,
            Action::Submenu,
            Action::ParentMenu,
            Action::Rescan,
            Action::Reboot,
            Action::Shutdown,
            Action::Debug,
            Action::Exit,
            Action::Error,
            Action::Timeout,
        ];
        for action in fixed {
            assert!(action.code() < BOOT_BASE);
            assert_eq!(Action::from_code(action.code()), Some(action));
            assert_eq!(action.boot_index(), None);
        }
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(Action::from_code(-1), None);
        assert_eq!(Action::from_code(BOOT_BASE - 1), None);
    }
}
