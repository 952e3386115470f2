//!
//! Rated item gallery
//! ------------------
//! Thin consumer of the user session widget: every item shows how many users
//! rated it, the mean rating and the logged-in user's own rating as five
//! stars. The gallery hosts its user session and is the session's parent, so
//! a session configured with `restart` re-renders the whole gallery on logout.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::UserConfig;
use crate::error::{AuthError, AuthResult};
use crate::identity::{Host, SessionDeps, UserSession};
use crate::render::fill_template;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryItem {
    pub title: String,
    #[serde(default)]
    pub image: String,
    #[serde(default)]
    pub description: String,
    /// user key -> stars (1..=5)
    #[serde(default)]
    pub ratings: BTreeMap<String, u8>,
}

impl GalleryItem {
    pub fn amount(&self) -> usize { self.ratings.len() }

    pub fn average(&self) -> Option<f64> {
        if self.ratings.is_empty() { return None; }
        let sum: u32 = self.ratings.values().map(|&r| u32::from(r)).sum();
        Some(f64::from(sum) / self.ratings.len() as f64)
    }

    pub fn rating_of(&self, user_key: &str) -> Option<u8> { self.ratings.get(user_key).copied() }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryData {
    pub key: String,
    pub title: String,
    #[serde(default)]
    pub items: Vec<GalleryItem>,
}

impl GalleryData {
    pub fn from_path(path: impl AsRef<Path>) -> AuthResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AuthError::config("gallery_read", format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text).map_err(|e| AuthError::config("gallery_parse", e.to_string()))
    }

    /// Built-in sample data.
    pub fn animals() -> Self {
        let item = |title: &str, image: &str, description: &str, r: [u8; 3]| GalleryItem {
            title: title.into(),
            image: image.into(),
            description: description.into(),
            ratings: [("mandy", r[0]), ("andy", r[1]), ("candy", r[2])]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        };
        GalleryData {
            key: "animals".into(),
            title: "Gallery of Animals".into(),
            items: vec![
                item("Sheep", "resources/images/sheep.jpg", "A sheep is a farm animal.", [5, 4, 2]),
                item("Seal", "resources/images/seal.jpg", "A seal lives in the sea.", [1, 4, 5]),
                item("Hedgehog", "resources/images/hedgehog.jpg", "A hedgehog is a wild animal.", [5, 4, 4]),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Star {
    Filled,
    Half,
    Empty,
}

impl Star {
    fn class(self) -> &'static str {
        match self {
            Star::Filled => "filled",
            Star::Half => "half",
            Star::Empty => "empty",
        }
    }
}

/// Five stars for a rating: star `i` is filled from `i`, half from `i - 0.5`.
pub fn stars(rating: f64) -> [Star; 5] {
    let mut out = [Star::Empty; 5];
    for (idx, star) in out.iter_mut().enumerate() {
        let i = (idx + 1) as f64;
        *star = if rating >= i { Star::Filled } else if rating >= i - 0.5 { Star::Half } else { Star::Empty };
    }
    out
}

fn stars_markup(rating: f64) -> String {
    stars(rating).iter().map(|s| format!(r#"<span class="star {}"></span>"#, s.class())).collect()
}

const MAIN_TEMPLATE: &str = r#"<div id="main"><h1>%title%</h1><div id="items">{items}</div><div id="user">{user}</div></div>"#;
const ITEM_TEMPLATE: &str = concat!(
    r#"<div class="item"><h2>%title%</h2><img src="%image%" alt="%title%"><p>%description%</p>"#,
    r#"<div class="own rating">{own}</div><div class="average"><span class="amount">%amount%</span>"#,
    r#"<div class="rating">{average}</div></div></div>"#
);

pub struct Gallery {
    parent: Option<Weak<dyn Host>>,
    data: Mutex<GalleryData>,
    user: OnceLock<Arc<UserSession>>,
}

impl Gallery {
    /// Build the gallery, start its user session as a child, then render.
    pub async fn create(data: GalleryData, user_config: UserConfig, deps: SessionDeps, parent: Option<&Arc<dyn Host>>) -> AuthResult<Arc<Self>> {
        let gallery = Arc::new(Self {
            parent: parent.map(Arc::downgrade),
            data: Mutex::new(data),
            user: OnceLock::new(),
        });
        let host: Arc<dyn Host> = gallery.clone();
        let user = UserSession::create(user_config, deps, Some(&host)).await?;
        if gallery.user.set(user).is_err() {
            return Err(AuthError::internal("gallery_user", "gallery user attached twice"));
        }
        gallery.start().await?;
        Ok(gallery)
    }

    pub fn session(&self) -> AuthResult<Arc<UserSession>> {
        self.user.get().cloned().ok_or_else(|| AuthError::internal("gallery_user", "gallery has no user session"))
    }

    /// Current gallery markup, rendered from the shared session's state at
    /// the time of the call.
    pub fn markup(&self) -> String {
        let Some(session) = self.user.get() else { return String::new(); };
        let key = session.value().and_then(|rec| rec.key().map(str::to_string));
        let user_markup = session.authority_handle().root().markup().to_string();
        self.render(key.as_deref(), &user_markup)
    }

    pub fn data(&self) -> GalleryData { self.data.lock().clone() }

    /// Record the logged-in user's rating for an item and re-render.
    pub async fn rate(&self, item: usize, stars: u8) -> AuthResult<()> {
        if !(1..=5).contains(&stars) {
            return Err(AuthError::invalid_input("invalid_rating", format!("rating must be 1..=5, got {}", stars)));
        }
        let session = self.session()?;
        let Some(key) = session.value().and_then(|rec| rec.key().map(str::to_string)) else {
            return Err(AuthError::not_logged_in("not_logged_in", "log in to rate items"));
        };
        {
            let mut data = self.data.lock();
            let Some(entry) = data.items.get_mut(item) else {
                return Err(AuthError::invalid_input("unknown_item", format!("no item at index {}", item)));
            };
            entry.ratings.insert(key.clone(), stars);
            info!(target: "gallery_auth::gallery", "user={} rated '{}' with {}", key, entry.title, stars);
        }
        self.start().await
    }

    fn render(&self, user_key: Option<&str>, user_markup: &str) -> String {
        let data = self.data.lock();
        let items: String = data.items.iter().map(|item| {
            let own = user_key.and_then(|k| item.rating_of(k)).map(f64::from).unwrap_or(0.0);
            let amount = item.amount().to_string();
            fill_template(ITEM_TEMPLATE, &[
                ("title", item.title.as_str()),
                ("image", item.image.as_str()),
                ("description", item.description.as_str()),
                ("amount", amount.as_str()),
            ])
            .replace("{own}", &stars_markup(own))
            .replace("{average}", &stars_markup(item.average().unwrap_or(0.0)))
        }).collect();
        fill_template(MAIN_TEMPLATE, &[("title", data.title.as_str())])
            .replace("{user}", user_markup)
            .replace("{items}", &items)
    }
}

#[async_trait]
impl Host for Gallery {
    fn name(&self) -> &str { "gallery" }

    fn parent(&self) -> Option<Arc<dyn Host>> { self.parent.as_ref().and_then(Weak::upgrade) }

    fn user(&self) -> Option<Arc<UserSession>> { self.user.get().cloned() }

    async fn start(&self) -> AuthResult<()> {
        let session = self.session()?;
        session.start().await?;
        let key = session.value().and_then(|rec| rec.key().map(str::to_string));
        debug!(target: "gallery_auth::gallery", "started gallery user={}", key.as_deref().unwrap_or("-"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stars_round_to_halves() {
        use Star::*;
        assert_eq!(stars(0.0), [Empty; 5]);
        assert_eq!(stars(3.0), [Filled, Filled, Filled, Empty, Empty]);
        assert_eq!(stars(3.67), [Filled, Filled, Filled, Half, Empty]);
        assert_eq!(stars(3.4), [Filled, Filled, Filled, Empty, Empty]);
        assert_eq!(stars(5.0), [Filled; 5]);
    }

    #[test]
    fn average_and_own_rating() {
        let data = GalleryData::animals();
        let sheep = &data.items[0];
        assert_eq!(sheep.amount(), 3);
        assert!((sheep.average().unwrap() - 11.0 / 3.0).abs() < 1e-9);
        assert_eq!(sheep.rating_of("andy"), Some(4));
        assert_eq!(sheep.rating_of("zoe"), None);
        let empty = GalleryItem { title: "x".into(), image: String::new(), description: String::new(), ratings: BTreeMap::new() };
        assert_eq!(empty.average(), None);
    }

    #[test]
    fn data_parses_with_defaults() {
        let data: GalleryData = serde_json::from_str(r#"{"key": "k", "title": "T", "items": [{"title": "A"}]}"#).unwrap();
        assert_eq!(data.items[0].amount(), 0);
    }
}
