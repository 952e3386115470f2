//! Gallery integration tests: the gallery hosts the user session, rating
//! needs a logged-in user and restart re-renders the whole gallery.

use std::sync::Arc;

use anyhow::Result;

use gallery_auth::config::UserConfig;
use gallery_auth::gallery::{Gallery, GalleryData};
use gallery_auth::identity::{SessionDeps, StaticAuthGateway, Suppress, TracingNotifier, UserSession, WidgetNode};
use gallery_auth::storage::KvSessionStore;
use gallery_auth::AuthError;

fn deps() -> SessionDeps {
    SessionDeps::new(
        Arc::new(StaticAuthGateway::single_user("zoe")),
        Arc::new(KvSessionStore::default()),
        Arc::new(TracingNotifier),
    )
}

#[tokio::test]
async fn rating_requires_login() -> Result<()> {
    let gallery = Gallery::create(GalleryData::animals(), UserConfig::default(), deps(), None).await?;
    let err = gallery.rate(0, 4).await.err();
    assert!(matches!(err, Some(AuthError::NotLoggedIn { .. })));
    assert!(gallery.markup().contains("logged_out"));

    gallery.session()?.login(Suppress::None).await?;
    gallery.rate(0, 4).await?;
    assert_eq!(gallery.data().items[0].rating_of("zoe"), Some(4));
    assert_eq!(gallery.data().items[0].amount(), 4);
    assert!(gallery.markup().contains("zoe"));
    Ok(())
}

#[tokio::test]
async fn invalid_ratings_are_rejected() -> Result<()> {
    let gallery = Gallery::create(GalleryData::animals(), UserConfig::default().with_logged_in(true), deps(), None).await?;
    assert!(matches!(gallery.rate(0, 6).await, Err(AuthError::InvalidInput { .. })));
    assert!(matches!(gallery.rate(0, 0).await, Err(AuthError::InvalidInput { .. })));
    assert!(matches!(gallery.rate(42, 3).await, Err(AuthError::InvalidInput { .. })));
    Ok(())
}

#[tokio::test]
async fn restart_rerenders_gallery_on_logout() -> Result<()> {
    let gallery = Gallery::create(
        GalleryData::animals(),
        UserConfig::default().with_logged_in(true).with_restart(true),
        deps(),
        None,
    )
    .await?;
    gallery.rate(1, 2).await?;
    assert!(gallery.markup().contains("logged_in"));

    gallery.session()?.logout(Suppress::None).await?;
    let markup = gallery.markup();
    assert!(markup.contains("logged_out"));
    assert!(!markup.contains("zoe"));
    Ok(())
}

#[tokio::test]
async fn nested_gallery_shares_the_page_session() -> Result<()> {
    let d = deps();
    let page = WidgetNode::root("page");
    let page_host = page.as_host();
    let page_user = UserSession::new(UserConfig::default(), d.clone(), Some(&page_host));
    assert!(page.attach_user(page_user.clone()));
    page_user.login(Suppress::None).await?;

    let gallery = Gallery::create(GalleryData::animals(), UserConfig::default(), d, Some(&page_host)).await?;
    let session = gallery.session()?;
    assert!(!session.is_authority());
    assert!(session.is_logged_in());
    gallery.rate(2, 5).await?;
    assert_eq!(gallery.data().items[2].rating_of("zoe"), Some(5));
    Ok(())
}

#[tokio::test]
async fn markup_follows_session_transitions() -> Result<()> {
    let gallery = Gallery::create(GalleryData::animals(), UserConfig::default(), deps(), None).await?;
    let session = gallery.session()?;
    assert!(gallery.markup().contains("logged_out"));

    session.login(Suppress::None).await?;
    let markup = gallery.markup();
    assert!(markup.contains("logged_in"));
    assert!(!markup.contains("logged_out"));
    assert!(markup.contains("zoe"));

    session.logout(Suppress::None).await?;
    let markup = gallery.markup();
    assert!(markup.contains("logged_out"));
    assert!(!markup.contains("zoe"));
    Ok(())
}

#[tokio::test]
async fn own_rating_stars_follow_the_logged_in_user() -> Result<()> {
    let mut data = GalleryData::animals();
    data.items.truncate(1);
    data.items[0].ratings.clear();
    data.items[0].ratings.insert("zoe".into(), 5);
    let gallery = Gallery::create(data, UserConfig::default(), deps(), None).await?;
    assert!(!gallery.markup().contains(r#"<div class="own rating"><span class="star filled">"#));

    gallery.session()?.login(Suppress::None).await?;
    assert!(gallery.markup().contains(r#"<div class="own rating"><span class="star filled">"#));
    Ok(())
}
