//! Screen groups and routes mounted below the session gate.
//!
//! ```text
//! Loading
//! AuthFlow  └─ Auth (login / register)
//! MainTabs  ├─ Home
//!           └─ Account ─▶ Profile | Password
//! ```

use std::fmt;

use crate::gate::{GateSnapshot, StackId};

/// Top-level screen group chosen by the gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScreenGroup {
    /// Placeholder while the initial lookup is pending
    Loading,
    AuthFlow,
    MainTabs,
}

impl ScreenGroup {
    pub fn initial_route(self) -> Route {
        match self {
            Self::Loading => Route::Loading,
            Self::AuthFlow => Route::Auth,
            Self::MainTabs => Route::Home,
        }
    }
}

impl fmt::Display for ScreenGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Loading => "loading",
            Self::AuthFlow => "auth",
            Self::MainTabs => "main",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tab {
    Home,
    Account,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Loading,
    Auth,
    Home,
    Account,
    Profile,
    Password,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Loading => "Loading",
            Self::Auth => "Auth",
            Self::Home => "Home",
            Self::Account => "Account",
            Self::Profile => "Profile",
            Self::Password => "Password",
        })
    }
}

/// Tracks what is mounted and remounts only when the gate's stack changes.
#[derive(Debug, Clone)]
pub struct Navigator {
    group: ScreenGroup,
    mounted: StackId,
    tab: Tab,
    /// Routes pushed on top of the Account tab
    account_stack: Vec<Route>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new()
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self {
            group: ScreenGroup::Loading,
            mounted: StackId::default(),
            tab: Tab::Home,
            account_stack: Vec::new(),
        }
    }

    /// Follows the gate. Returns true if the stack was remounted.
    pub fn sync(&mut self, snapshot: &GateSnapshot) -> bool {
        if snapshot.stack == self.mounted {
            return false;
        }
        tracing::debug!(from = %self.group, to = %snapshot.screen_group(), "remounting screen stack");
        self.mounted = snapshot.stack;
        self.group = snapshot.screen_group();
        self.tab = Tab::Home;
        self.account_stack.clear();
        true
    }

    pub fn group(&self) -> ScreenGroup {
        self.group
    }

    pub fn tab(&self) -> Option<Tab> {
        (self.group == ScreenGroup::MainTabs).then_some(self.tab)
    }

    /// The route currently on screen.
    pub fn current(&self) -> Route {
        match (self.group, self.tab) {
            (ScreenGroup::MainTabs, Tab::Home) => Route::Home,
            (ScreenGroup::MainTabs, Tab::Account) => {
                self.account_stack.last().copied().unwrap_or(Route::Account)
            }
            (group, _) => group.initial_route(),
        }
    }

    /// Switches tabs. Ignored outside the main tabs.
    pub fn select_tab(&mut self, tab: Tab) -> bool {
        if self.group != ScreenGroup::MainTabs {
            return false;
        }
        self.tab = tab;
        true
    }

    /// Opens Profile or Password from the Account screen.
    pub fn push(&mut self, route: Route) -> bool {
        let allowed = matches!(route, Route::Profile | Route::Password)
            && self.current() == Route::Account;
        if allowed {
            self.account_stack.push(route);
        }
        allowed
    }

    pub fn back(&mut self) -> bool {
        if self.tab().is_some_and(|tab| tab == Tab::Account) {
            self.account_stack.pop().is_some()
        } else {
            false
        }
    }
}
