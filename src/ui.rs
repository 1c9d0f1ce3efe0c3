//! Event loop
//!
//! A [`Session`] owns everything the menu needs between key presses: the
//! menu tree, the boot catalog, the debug log and the collaborators used by
//! the system menu. Actions are dispatched by the active [`UiContext`].

use crate::action::Action;
use crate::catalog::{BootCatalog, BootItem};
use crate::console::{InputSource, Renderer};
use crate::error::UiError;
use crate::logger::DebugLog;
use crate::menu::Menu;
use crate::populate::{build_menu, clear_boot_entries, populate, IconSet, SYSTEM_ENTRIES};
use crate::power::{PowerAction, PowerControl};
use crate::scan::Scanner;

pub const RESCAN_MESSAGE: &str = "Rescanning devices.\nPlease wait...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiContext {
    Menu,
    TextView,
}

/// Outcome of one action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Continue,
    /// Boot the catalog entry at this index
    Boot(usize),
    Fail,
}

pub struct Session {
    menu: Menu,
    catalog: BootCatalog,
    log: DebugLog,
    context: UiContext,
    init_mode: bool,
    scanner: Scanner,
    icons: IconSet,
    renderer: Option<Box<dyn Renderer>>,
    power: Box<dyn PowerControl>,
    failure: Option<UiError>,
}

impl Session {
    pub fn new(scanner: Scanner, icons: IconSet, power: Box<dyn PowerControl>, init_mode: bool, log: DebugLog) -> Self {
        Self {
            menu: build_menu(init_mode, &icons),
            catalog: BootCatalog::new(),
            log,
            context: UiContext::Menu,
            init_mode,
            scanner,
            icons,
            renderer: None,
            power,
            failure: None,
        }
    }

    pub fn with_renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn menu(&self) -> &Menu {
        &self.menu
    }

    pub fn catalog(&self) -> &BootCatalog {
        &self.catalog
    }

    pub fn log(&self) -> &DebugLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut DebugLog {
        &mut self.log
    }

    pub fn context(&self) -> UiContext {
        self.context
    }

    /// Drop the current boot entries, scan again and repopulate the menu
    pub fn load(&mut self) -> Result<usize, UiError> {
        clear_boot_entries(&mut self.menu);
        self.catalog = BootCatalog::new();

        let catalog = self.scanner.scan(&mut self.log).map_err(UiError::Rescan)?;
        let added = populate(&mut self.menu, &catalog, &self.icons, &mut self.log);
        self.catalog = catalog;
        Ok(added)
    }

    /// Dispatch one action in the current context
    pub fn handle(&mut self, action: Action) -> Step {
        match self.context {
            UiContext::Menu => self.handle_menu(action),
            UiContext::TextView => self.handle_text(action),
        }
    }

    fn handle_menu(&mut self, action: Action) -> Step {
        let action = match action {
            Action::Select => self.menu.current_action().unwrap_or(Action::None),
            other => other,
        };

        match action {
            Action::Up => self.menu.select(-1),
            Action::Down => self.menu.select(1),
            Action::Submenu => {
                self.menu.enter_submenu();
            }
            Action::ParentMenu => {
                self.menu.leave_submenu();
            }
            Action::Reboot => self.power_transition(PowerAction::Restart),
            Action::Shutdown => self.power_transition(PowerAction::PowerOff),
            Action::Rescan => {
                self.show_message(RESCAN_MESSAGE);
                if let Err(e) = self.load() {
                    self.log.error(format_args!("Rescan failed: {}", e));
                    return self.fail(e);
                }
            }
            Action::Debug => self.context = UiContext::TextView,
            Action::Exit | Action::Error => return self.exit(action),
            Action::Timeout => return self.timeout(),
            Action::Boot(index) => return Step::Boot(index),
            Action::None | Action::Select => {}
        }

        Step::Continue
    }

    fn handle_text(&mut self, action: Action) -> Step {
        match action {
            Action::Up => self.log.line_up(),
            Action::Down => self.log.line_down(),
            Action::Select => self.context = UiContext::Menu,
            Action::Exit | Action::Error => return self.exit(action),
            _ => {}
        }
        Step::Continue
    }

    fn exit(&mut self, action: Action) -> Step {
        if action == Action::Exit && self.init_mode {
            self.log.debug(format_args!("Exit ignored in init mode"));
            return Step::Continue;
        }
        self.fail(UiError::Aborted)
    }

    fn fail(&mut self, error: UiError) -> Step {
        self.failure = Some(error);
        Step::Fail
    }

    /// Boot the first entry after the system menu entry, if there is one.
    /// Ignored outside the top level.
    fn timeout(&mut self) -> Step {
        if self.menu.current_level_id() != self.menu.top() || self.menu.current_count() <= SYSTEM_ENTRIES {
            return Step::Continue;
        }
        self.menu.select_index(SYSTEM_ENTRIES);
        match self.menu.current_action() {
            Some(Action::Boot(index)) => {
                self.log.info(format_args!("Timeout reached, booting first entry"));
                Step::Boot(index)
            }
            _ => Step::Continue,
        }
    }

    fn power_transition(&mut self, action: PowerAction) {
        self.show_message(action.message());
        self.power.sync();
        if let Err(e) = self.power.reboot(action) {
            let what = match action {
                PowerAction::Restart => "reboot",
                PowerAction::PowerOff => "shutdown",
            };
            self.log.error(format_args!("Can't initiate {}: {}", what, e));
        }
    }

    fn show_message(&mut self, message: &str) {
        if let Some(renderer) = self.renderer.as_mut() {
            renderer.show_message(message);
        }
    }

    fn draw(&mut self) {
        let Some(renderer) = self.renderer.as_mut() else {
            return;
        };
        match self.context {
            UiContext::Menu => renderer.show_menu(&self.menu),
            UiContext::TextView => renderer.show_text(&self.log),
        }
    }

    /// Run until an entry is chosen or the loop fails
    pub fn run(&mut self, input: &mut dyn InputSource) -> Result<usize, UiError> {
        self.context = UiContext::Menu;
        self.draw();

        loop {
            let action = input.next_action();
            match self.handle(action) {
                Step::Continue => self.draw(),
                Step::Boot(index) => return Ok(index),
                Step::Fail => return Err(self.failure.take().unwrap_or(UiError::Aborted)),
            }
        }
    }

    /// Hand over the chosen entry and the log for the launch
    pub fn finish(self, index: usize) -> (Option<BootItem>, DebugLog) {
        (self.catalog.into_item(index), self.log)
    }
}
