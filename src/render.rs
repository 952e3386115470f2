//! Render adapter for the user widget: fills the logged-in / logged-out
//! templates and remembers which view is currently shown.

use crate::config::Templates;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    LoggedIn,
    LoggedOut,
}

/// What the single button of the rendered view does when clicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonAction {
    Login,
    Logout,
}

/// Rendered content of one widget instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    view: Option<ViewKind>,
    markup: String,
}

impl Element {
    pub fn view(&self) -> Option<ViewKind> { self.view }
    pub fn markup(&self) -> &str { &self.markup }
    pub fn is_empty(&self) -> bool { self.view.is_none() && self.markup.is_empty() }

    pub fn shows(&self, kind: ViewKind) -> bool { self.view == Some(kind) }

    pub fn button(&self) -> Option<ButtonAction> {
        match self.view? {
            ViewKind::LoggedIn => Some(ButtonAction::Logout),
            ViewKind::LoggedOut => Some(ButtonAction::Login),
        }
    }

    pub fn clear(&mut self) { *self = Element::default(); }
}

pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Replace every `%name%` placeholder with the escaped value. Unknown
/// placeholders are left as they are.
pub fn fill_template(template: &str, subs: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in subs {
        out = out.replace(&format!("%{}%", name), &escape_html(value));
    }
    out
}

pub fn logged_in_view(templates: &Templates, user: &str, picture: &str) -> Element {
    Element {
        view: Some(ViewKind::LoggedIn),
        markup: fill_template(&templates.logged_in, &[("user", user), ("picture", picture)]),
    }
}

pub fn logged_out_view(templates: &Templates) -> Element {
    Element { view: Some(ViewKind::LoggedOut), markup: fill_template(&templates.logged_out, &[]) }
}
