//! Menu construction
//!
//! [`build_menu`] creates the fixed part (system submenu), [`populate`] adds
//! one top-level entry per catalog item, highest priority first.

use std::path::Path;

use crate::action::Action;
use crate::catalog::{BootCatalog, BootItem, DeviceClass, IconHandle};
use crate::config::IconPaths;
use crate::logger::DebugLog;
use crate::menu::{Menu, MenuItem};
use crate::scan::IconDecoder;

/// Number of fixed top-level entries preceding the boot entries
pub const SYSTEM_ENTRIES: usize = 1;

/// Icons used when an entry has none of its own
#[derive(Debug, Clone, Default)]
pub struct IconSet {
    pub storage: Option<IconHandle>,
    pub mmc: Option<IconHandle>,
    pub memory: Option<IconHandle>,
    pub system: Option<IconHandle>,
    pub back: Option<IconHandle>,
    pub rescan: Option<IconHandle>,
    pub debug: Option<IconHandle>,
    pub reboot: Option<IconHandle>,
    pub shutdown: Option<IconHandle>,
    pub exit: Option<IconHandle>,
}

impl IconSet {
    /// Load the configured icons. An icon that can't be loaded is left out.
    pub fn load(paths: &IconPaths, decoder: &dyn IconDecoder, log: &mut DebugLog) -> Self {
        let mut load = |path: &Option<std::path::PathBuf>| -> Option<IconHandle> {
            let path: &Path = path.as_deref()?;
            match decoder.decode(path) {
                Ok(icon) => Some(icon),
                Err(e) => {
                    log.warn(format_args!("Can't load icon: {}", e));
                    None
                }
            }
        };

        Self {
            storage: load(&paths.storage),
            mmc: load(&paths.mmc),
            memory: load(&paths.memory),
            system: load(&paths.system),
            back: load(&paths.back),
            rescan: load(&paths.rescan),
            debug: load(&paths.debug),
            reboot: load(&paths.reboot),
            shutdown: load(&paths.shutdown),
            exit: load(&paths.exit),
        }
    }

    /// Default icon for a device class
    pub fn for_class(&self, class: DeviceClass) -> Option<IconHandle> {
        match class {
            DeviceClass::Storage => self.storage.clone(),
            DeviceClass::Mmc => self.mmc.clone(),
            DeviceClass::Mtd => self.memory.clone(),
            DeviceClass::Unknown => None,
        }
    }
}

/// Create the menu with its system submenu. "Exit" is omitted in init mode.
pub fn build_menu(init_mode: bool, icons: &IconSet) -> Menu {
    let mut menu = Menu::new();
    let top = menu.top();
    let system = menu.add_level(top);

    menu.add_item(
        top,
        MenuItem::new(Action::Submenu, "System menu")
            .submenu(system)
            .icon(icons.system.clone()),
    );

    menu.add_item(system, MenuItem::new(Action::ParentMenu, "Back").icon(icons.back.clone()));
    menu.add_item(system, MenuItem::new(Action::Rescan, "Rescan").icon(icons.rescan.clone()));
    menu.add_item(system, MenuItem::new(Action::Debug, "Show debug info").icon(icons.debug.clone()));
    menu.add_item(system, MenuItem::new(Action::Reboot, "Reboot").icon(icons.reboot.clone()));
    menu.add_item(system, MenuItem::new(Action::Shutdown, "Shutdown").icon(icons.shutdown.clone()));
    if !init_mode {
        menu.add_item(system, MenuItem::new(Action::Exit, "Exit").icon(icons.exit.clone()));
    }

    menu.select_index(0);
    menu
}

/// Catalog indices ordered by descending priority; ties keep catalog order
pub fn priority_order(catalog: &BootCatalog) -> Vec<usize> {
    let items = catalog.items();
    let mut processed = vec![false; items.len()];
    let mut order = Vec::with_capacity(items.len());

    loop {
        let mut best: Option<usize> = None;
        for (i, item) in items.iter().enumerate() {
            if processed[i] {
                continue;
            }
            match best {
                Some(b) if items[b].priority >= item.priority => {}
                _ => best = Some(i),
            }
        }

        let Some(i) = best else { break };
        processed[i] = true;
        order.push(i);
    }

    order
}

/// One-line summary: device, filesystem and size in megabytes
pub fn describe(item: &BootItem) -> String {
    format!(
        "{} {} {}Mb",
        item.device,
        item.fstype.as_deref().unwrap_or(""),
        item.blocks / 1024
    )
}

/// Add the catalog's entries to the top level. Returns how many were added.
pub fn populate(menu: &mut Menu, catalog: &BootCatalog, icons: &IconSet, log: &mut DebugLog) -> usize {
    if catalog.is_empty() {
        log.info(format_args!("No items for menu found"));
        return 0;
    }

    log.info(format_args!("Populating menu: {} item(s)", catalog.len()));

    let top = menu.top();
    let order = priority_order(catalog);
    for &index in &order {
        let Some(item) = catalog.get(index) else {
            continue;
        };
        let label = item.display_label();
        log.info(format_args!("+ [{}]", label));

        let icon = item.icon.clone().or_else(|| icons.for_class(item.class));
        menu.add_item(
            top,
            MenuItem::new(Action::Boot(index), label)
                .description(describe(item))
                .icon(icon),
        );
    }

    order.len()
}

/// Remove every boot entry, keeping the system submenu
pub fn clear_boot_entries(menu: &mut Menu) {
    menu.truncate_top(SYSTEM_ENTRIES);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{BootInfo, DeviceInfo};

    fn catalog(entries: &[(&str, i32)]) -> BootCatalog {
        let mut catalog = BootCatalog::new();
        for (device, priority) in entries {
            let dev = DeviceInfo {
                device: device.to_string(),
                fstype: "ext2".to_string(),
                class: DeviceClass::Storage,
                blocks: 1_048_576,
            };
            let info = BootInfo {
                kernel: "/mnt/boot/zImage".to_string(),
                priority: Some(*priority),
                ..Default::default()
            };
            catalog.commit(BootItem::from_probe(&dev, info)).unwrap();
        }
        catalog
    }

    fn top_actions(menu: &Menu) -> Vec<Action> {
        menu.level(menu.top()).items().iter().map(|i| i.action).collect()
    }

    #[test]
    fn test_system_menu_entries() {
        let menu = build_menu(false, &IconSet::default());
        assert_eq!(menu.current_count(), SYSTEM_ENTRIES);

        let mut menu = menu;
        assert!(menu.enter_submenu());
        let labels: Vec<_> = menu.current_level().items().iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["Back", "Rescan", "Show debug info", "Reboot", "Shutdown", "Exit"]);
    }

    #[test]
    fn test_init_mode_has_no_exit() {
        let mut menu = build_menu(true, &IconSet::default());
        assert!(menu.enter_submenu());
        assert!(menu
            .current_level()
            .items()
            .iter()
            .all(|i| i.action != Action::Exit));
    }

    #[test]
    fn test_entries_sorted_by_priority() {
        let catalog = catalog(&[("/dev/sda1", 1), ("/dev/sda2", 5), ("/dev/sda3", -2), ("/dev/sda4", 5)]);
        let mut menu = build_menu(false, &IconSet::default());
        let mut log = DebugLog::new();

        assert_eq!(populate(&mut menu, &catalog, &IconSet::default(), &mut log), 4);
        assert_eq!(
            top_actions(&menu),
            vec![
                Action::Submenu,
                Action::Boot(1),
                Action::Boot(3),
                Action::Boot(0),
                Action::Boot(2),
            ]
        );
    }

    #[test]
    fn test_priority_order_is_non_increasing() {
        let catalog = catalog(&[("a", 0), ("b", 3), ("c", 3), ("d", 7), ("e", -1), ("f", 0)]);
        let order = priority_order(&catalog);
        assert_eq!(order, vec![3, 1, 2, 0, 5, 4]);
        let priorities: Vec<i32> = order.iter().map(|&i| catalog.get(i).unwrap().priority).collect();
        assert!(priorities.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn test_label_and_description() {
        let mut catalog = catalog(&[("/dev/sda1", 1)]);
        catalog.get_mut(0).unwrap().label = Some("Angstrom".to_string());
        let mut menu = build_menu(false, &IconSet::default());
        populate(&mut menu, &catalog, &IconSet::default(), &mut DebugLog::new());

        let entry = &menu.level(menu.top()).items()[1];
        assert_eq!(entry.label, "Angstrom");
        assert_eq!(entry.description.as_deref(), Some("/dev/sda1 ext2 1024Mb"));
    }

    #[test]
    fn test_default_icon_by_class() {
        let mut catalog = catalog(&[("/dev/sda1", 2), ("/dev/mtdblock2", 1)]);
        catalog.get_mut(1).unwrap().class = DeviceClass::Unknown;
        let icons = IconSet {
            storage: Some(IconHandle::new(b"disk".to_vec())),
            ..Default::default()
        };
        let mut menu = build_menu(false, &icons);
        populate(&mut menu, &catalog, &icons, &mut DebugLog::new());

        let items = menu.level(menu.top()).items();
        assert_eq!(items[1].icon.as_ref().map(|i| i.data()), Some(&b"disk"[..]));
        assert!(items[2].icon.is_none());
    }

    #[test]
    fn test_icon_set_load() {
        let dir = tempfile::tempdir().unwrap();
        let mmc = dir.path().join("mmc.xpm");
        std::fs::write(&mmc, b"/* XPM */").unwrap();
        let paths = IconPaths {
            mmc: Some(mmc),
            storage: Some(dir.path().join("missing.xpm")),
            ..Default::default()
        };
        let mut log = DebugLog::new();

        let icons = IconSet::load(&paths, &crate::probe::FileIconLoader, &mut log);
        assert_eq!(icons.mmc.as_ref().map(|i| i.data()), Some(&b"/* XPM */"[..]));
        assert!(icons.storage.is_none());
        assert!(icons.system.is_none());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_empty_catalog_adds_nothing() {
        let mut menu = build_menu(false, &IconSet::default());
        let added = populate(&mut menu, &BootCatalog::new(), &IconSet::default(), &mut DebugLog::new());
        assert_eq!(added, 0);
        assert_eq!(menu.current_count(), SYSTEM_ENTRIES);
    }

    #[test]
    fn test_clear_keeps_system_entry() {
        let catalog = catalog(&[("/dev/sda1", 1), ("/dev/sda2", 2)]);
        let mut menu = build_menu(false, &IconSet::default());
        populate(&mut menu, &catalog, &IconSet::default(), &mut DebugLog::new());
        clear_boot_entries(&mut menu);
        assert_eq!(top_actions(&menu), vec![Action::Submenu]);
    }
}
