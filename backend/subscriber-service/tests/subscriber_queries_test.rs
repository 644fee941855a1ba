//! GetSubscriber and ListSubscribers
mod common;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use account_client::AccountError;
use authz::RequestContext;
use common::*;
use cursor_codec::CursorCodec;
use error_types::ErrorKind;
use subscriber_service::{ListSubscribersRequest, MAX_SUBSCRIBER_PAGE_SIZE};

fn list_request(page_size: i32, page_token: &str, channels: &[&str]) -> ListSubscribersRequest {
    ListSubscribersRequest {
        page_size,
        page_token: page_token.to_string(),
        channels: names(channels),
    }
}

// ============================================
// GetSubscriber
// ============================================

#[tokio::test]
async fn test_contact_fields_only_for_admins() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let recorded = seen.clone();

    let mut accounts = MockAccounts::new();
    accounts
        .expect_get_account()
        .times(2)
        .returning(move |id, privileged| {
            recorded.lock().unwrap().push(privileged);
            Ok(account(id))
        });

    let h = harness(accounts);
    h.store.seed("alice", "news");

    let own = h.registry.get_subscriber(&as_alice(), "alice").await.unwrap();
    assert_eq!(own.name, "User alice");
    assert_eq!(own.channels, names(&["news"]));
    assert!(own.email.is_none());
    assert!(own.phone.is_none());

    let audited = h.registry.get_subscriber(&as_admin(), "alice").await.unwrap();
    assert_eq!(audited.email.as_deref(), Some("alice@example.com"));
    assert!(audited.phone.is_some());

    assert_eq!(*seen.lock().unwrap(), vec![false, true]);
}

#[tokio::test]
async fn test_subscriber_without_channels() {
    let h = harness(known_accounts());

    let subscriber = h.registry.get_subscriber(&as_bob(), "bob").await.unwrap();
    assert_eq!(subscriber.id, "bob");
    assert!(subscriber.channels.is_empty());
}

#[tokio::test]
async fn test_missing_account_is_not_found() {
    let mut accounts = MockAccounts::new();
    accounts
        .expect_get_account()
        .returning(|id, _| Err(AccountError::NotFound(id.to_string())));

    let h = harness(accounts);
    let err = h
        .registry
        .get_subscriber(&as_alice(), "alice")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(err.to_string().starts_with("GetSubscriber: "));
}

#[tokio::test]
async fn test_account_service_failure_is_internal() {
    let mut accounts = MockAccounts::new();
    accounts.expect_get_account().returning(|_, _| {
        Err(AccountError::Unexpected {
            status: 503,
            body: "unavailable".to_string(),
        })
    });

    let h = harness(accounts);
    let err = h
        .registry
        .get_subscriber(&as_alice(), "alice")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Internal);
}

#[tokio::test]
async fn test_get_other_subscriber_is_denied() {
    let mut accounts = MockAccounts::new();
    accounts.expect_get_account().times(0);

    let h = harness(accounts);
    let err = h
        .registry
        .get_subscriber(&as_bob(), "alice")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PermissionDenied);

    let err = h.registry.get_subscriber(&as_bob(), " ").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

// ============================================
// ListSubscribers
// ============================================

#[tokio::test]
async fn test_listing_requires_admin() {
    let h = harness(known_accounts());
    h.store.seed("alice", "news");

    let err = h
        .registry
        .list_subscribers(&as_alice(), list_request(10, "", &[]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::PermissionDenied);
    assert!(err.to_string().starts_with("ListSubscribers: "));
}

#[tokio::test]
async fn test_listing_checks_caller_before_inspecting_request() {
    let h = harness(known_accounts());
    let foreign = CursorCodec::new("elsewhere", 10).encode(&[7]).unwrap();

    // a non-admin learns nothing about token or filter validity
    for (token, channels) in [
        ("not-a-token!", vec![]),
        (foreign.as_str(), vec!["news"]),
        ("", vec!["news", "   "]),
    ] {
        let err = h
            .registry
            .list_subscribers(&as_alice(), list_request(10, token, &channels))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied, "token {:?}", token);
    }

    let err = h
        .registry
        .list_subscribers(
            &RequestContext::anonymous(),
            list_request(10, "not-a-token!", &["   "]),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthenticated);
    assert_eq!(h.store.begins(), 0);
}

#[tokio::test]
async fn test_listing_traverses_every_subscriber_once() {
    let h = harness(known_accounts());
    for (user, channel) in [
        ("u0", "news"),
        ("u1", "news"),
        ("u2", "sports"),
        ("u0", "sports"),
        ("u3", "tech"),
        ("u4", "news"),
        ("u5", "tech"),
        ("u6", "news"),
        ("u1", "tech"),
    ] {
        h.store.seed(user, channel);
    }

    let mut seen = Vec::new();
    let mut token = String::new();
    let mut pages = 0;
    loop {
        let page = h
            .registry
            .list_subscribers(&as_admin(), list_request(3, &token, &[]))
            .await
            .unwrap();

        if pages == 0 {
            assert_eq!(page.collection_count, 7);
        } else {
            assert_eq!(page.collection_count, 0);
        }
        pages += 1;

        seen.extend(page.items.into_iter().map(|s| s.id));
        if page.next_page_token.is_empty() {
            break;
        }
        token = page.next_page_token;
    }

    let unique: HashSet<&String> = seen.iter().collect();
    assert_eq!(seen.len(), 7);
    assert_eq!(unique.len(), 7);
    assert_eq!(&seen[..3], names(&["u1", "u6", "u5"]).as_slice());
}

#[tokio::test]
async fn test_channel_filter_groups_by_subscriber() {
    let h = harness(known_accounts());
    h.store.seed("alice", "news");
    h.store.seed("alice", "sports");
    h.store.seed("bob", "news");
    h.store.seed("carol", "tech");

    let page = h
        .registry
        .list_subscribers(&as_admin(), list_request(10, "", &["news", " sports"]))
        .await
        .unwrap();

    let ids: Vec<&str> = page.items.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["bob", "alice"]);
    assert_eq!(page.collection_count, 2);
    assert!(page.next_page_token.is_empty());

    // Channels are the subscriber's full membership, not just the filter hits
    assert_eq!(page.items[1].channels, names(&["news", "sports"]));
    // Admin callers see contact fields
    assert!(page.items[0].email.is_some());
}

#[tokio::test]
async fn test_missing_accounts_are_skipped() {
    let mut accounts = MockAccounts::new();
    accounts.expect_get_account().returning(|id, _| {
        if id == "ghost" {
            Err(AccountError::NotFound(id.to_string()))
        } else {
            Ok(account(id))
        }
    });

    let h = harness(accounts);
    h.store.seed("alice", "news");
    h.store.seed("ghost", "news");
    h.store.seed("bob", "news");

    let first = h
        .registry
        .list_subscribers(&as_admin(), list_request(3, "", &[]))
        .await
        .unwrap();
    let ids: Vec<&str> = first.items.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["bob", "alice"]);
    assert_eq!(first.collection_count, 3);
    assert!(!first.next_page_token.is_empty());

    let second = h
        .registry
        .list_subscribers(&as_admin(), list_request(3, &first.next_page_token, &[]))
        .await
        .unwrap();
    assert!(second.items.is_empty());
    assert!(second.next_page_token.is_empty());
}

#[tokio::test]
async fn test_bad_page_token_is_invalid_argument() {
    let h = harness(known_accounts());

    let err = h
        .registry
        .list_subscribers(&as_admin(), list_request(10, "not-a-token!", &[]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[tokio::test]
async fn test_page_size_is_clamped() {
    let h = harness(known_accounts());
    for i in 0..60 {
        h.store.seed(&format!("user-{:02}", i), "news");
    }

    for requested in [0, -5, 100] {
        let page = h
            .registry
            .list_subscribers(&as_admin(), list_request(requested, "", &[]))
            .await
            .unwrap();
        assert_eq!(page.items.len(), MAX_SUBSCRIBER_PAGE_SIZE as usize);
        assert!(!page.next_page_token.is_empty());
    }
}
