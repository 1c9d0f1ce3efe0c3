//! Two-level navigable menu
//!
//! Levels are stored in a flat vector and linked by index. The top level
//! holds the system submenu entry followed by boot entries.

use crate::action::Action;
use crate::catalog::IconHandle;

/// Index of a menu level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelId(usize);

#[derive(Debug, Clone)]
pub struct MenuItem {
    pub action: Action,
    pub label: String,
    pub description: Option<String>,
    pub submenu: Option<LevelId>,
    pub icon: Option<IconHandle>,
}

impl MenuItem {
    pub fn new(action: Action, label: impl Into<String>) -> Self {
        Self {
            action,
            label: label.into(),
            description: None,
            submenu: None,
            icon: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn submenu(mut self, level: LevelId) -> Self {
        self.submenu = Some(level);
        self
    }

    pub fn icon(mut self, icon: Option<IconHandle>) -> Self {
        self.icon = icon;
        self
    }
}

#[derive(Debug, Clone)]
pub struct MenuLevel {
    items: Vec<MenuItem>,
    parent: Option<LevelId>,
    current: usize,
}

impl MenuLevel {
    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    /// Index of the highlighted item
    pub fn current(&self) -> usize {
        self.current
    }

    pub fn parent(&self) -> Option<LevelId> {
        self.parent
    }
}

#[derive(Debug, Clone)]
pub struct Menu {
    levels: Vec<MenuLevel>,
    current: LevelId,
}

impl Menu {
    /// Create a menu with an empty top level
    pub fn new() -> Self {
        Self {
            levels: vec![MenuLevel {
                items: Vec::new(),
                parent: None,
                current: 0,
            }],
            current: LevelId(0),
        }
    }

    pub fn top(&self) -> LevelId {
        LevelId(0)
    }

    pub fn add_level(&mut self, parent: LevelId) -> LevelId {
        self.levels.push(MenuLevel {
            items: Vec::new(),
            parent: Some(parent),
            current: 0,
        });
        LevelId(self.levels.len() - 1)
    }

    /// Append an item to `level`, returning its position
    pub fn add_item(&mut self, level: LevelId, item: MenuItem) -> usize {
        let items = &mut self.levels[level.0].items;
        items.push(item);
        items.len() - 1
    }

    pub fn level(&self, level: LevelId) -> &MenuLevel {
        &self.levels[level.0]
    }

    pub fn current_level_id(&self) -> LevelId {
        self.current
    }

    pub fn current_level(&self) -> &MenuLevel {
        &self.levels[self.current.0]
    }

    /// Number of items on the current level
    pub fn current_count(&self) -> usize {
        self.current_level().items.len()
    }

    pub fn current_item(&self) -> Option<&MenuItem> {
        let level = self.current_level();
        level.items.get(level.current)
    }

    /// Action of the highlighted item
    pub fn current_action(&self) -> Option<Action> {
        self.current_item().map(|item| item.action)
    }

    /// Move the highlight by `delta`, wrapping around at both ends
    pub fn select(&mut self, delta: isize) {
        let level = &mut self.levels[self.current.0];
        let count = level.items.len() as isize;
        if count == 0 {
            return;
        }
        level.current = (level.current as isize + delta).rem_euclid(count) as usize;
    }

    /// Highlight the item at `index` on the current level
    pub fn select_index(&mut self, index: usize) {
        let level = &mut self.levels[self.current.0];
        if index < level.items.len() {
            level.current = index;
        }
    }

    /// Descend into the highlighted item's submenu
    pub fn enter_submenu(&mut self) -> bool {
        let submenu = self.current_item().and_then(|item| item.submenu);
        match submenu {
            Some(level) => {
                self.current = level;
                true
            }
            None => false,
        }
    }

    /// Go back to the parent level
    pub fn leave_submenu(&mut self) -> bool {
        let parent = self.current_level().parent;
        match parent {
            Some(parent) => {
                self.current = parent;
                true
            }
            None => false,
        }
    }

    /// Drop top-level items past the first `keep`
    pub fn truncate_top(&mut self, keep: usize) {
        let top = &mut self.levels[0];
        top.items.truncate(keep);
        if top.current >= top.items.len() {
            top.current = 0;
        }
    }
}

impl Default for Menu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_level_menu() -> Menu {
        let mut menu = Menu::new();
        let top = menu.top();
        let system = menu.add_level(top);
        menu.add_item(top, MenuItem::new(Action::Submenu, "System menu").submenu(system));
        menu.add_item(top, MenuItem::new(Action::Boot(0), "zImage"));
        menu.add_item(top, MenuItem::new(Action::Boot(1), "uImage"));
        menu.add_item(system, MenuItem::new(Action::ParentMenu, "Back"));
        menu.add_item(system, MenuItem::new(Action::Rescan, "Rescan"));
        menu
    }

    #[test]
    fn test_select_wraps_around() {
        let mut menu = two_level_menu();
        assert_eq!(menu.current_action(), Some(Action::Submenu));
        menu.select(-1);
        assert_eq!(menu.current_action(), Some(Action::Boot(1)));
        menu.select(1);
        menu.select(1);
        assert_eq!(menu.current_action(), Some(Action::Boot(0)));
        menu.select(3);
        assert_eq!(menu.current_action(), Some(Action::Boot(0)));
        menu.select(-4);
        assert_eq!(menu.current_action(), Some(Action::Submenu));
    }

    #[test]
    fn test_submenu_navigation() {
        let mut menu = two_level_menu();
        assert!(menu.enter_submenu());
        assert_eq!(menu.current_count(), 2);
        assert_eq!(menu.current_action(), Some(Action::ParentMenu));
        assert!(!menu.enter_submenu());
        assert!(menu.leave_submenu());
        assert_eq!(menu.current_level_id(), menu.top());
        assert!(!menu.leave_submenu());
    }

    #[test]
    fn test_truncate_top_resets_highlight() {
        let mut menu = two_level_menu();
        menu.select_index(2);
        menu.truncate_top(1);
        assert_eq!(menu.current_count(), 1);
        assert_eq!(menu.current_action(), Some(Action::Submenu));
    }

    #[test]
    fn test_empty_level_select_is_noop() {
        let mut menu = Menu::new();
        menu.select(1);
        assert_eq!(menu.current_action(), None);
    }
}
