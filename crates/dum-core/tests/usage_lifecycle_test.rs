//! Usage creation, handles and destruction through the manager

mod common;

use common::*;
use rvoip_dum_core::{
    DialogId, DialogSetId, DumError, DumTimerKind, Method, SipMessage, StatusCode, UsageHandle, UsageKind,
};

/// Deliver an inbound INVITE and return the dialog its server session lives in
async fn server_invite(t: &mut TestDum) -> (UsageHandle, DialogId) {
    t.deliver_request(inbound(Method::Invite)).await;
    let handle = t.dum.usage_handles()[0];
    let dialog_id = t.dum.get_usage(handle).unwrap().dialog_id().clone();
    (handle, dialog_id)
}

#[tokio::test]
async fn test_handles_go_stale_after_destruction() {
    let mut t = TestDum::new();
    t.deliver_request(inbound(Method::Options)).await;
    let handle = t.dum.usage_handles()[0];
    assert!(t.dum.is_valid(handle));

    t.dum.respond(handle, StatusCode::OK).await.unwrap();
    assert_eq!(single_response(&t.sent()).status(), StatusCode::OK);

    assert!(!t.dum.is_valid(handle));
    assert_eq!(t.dum.get_usage(handle).unwrap_err(), DumError::StaleHandle { handle });
    assert!(t.dum.get_usage_mut(handle).unwrap_err().is_stale_handle());
    assert!(!t.dum.destroy_usage(handle));
    assert_eq!(
        t.dum.respond(handle, StatusCode::OK).await.unwrap_err(),
        DumError::StaleHandle { handle }
    );
    assert!(t.deliver_timer(handle, DumTimerKind::Refresh).await.is_empty());
    assert!(t.deliver_timer(handle, DumTimerKind::SessionExpired).await.is_empty());
}

#[tokio::test]
async fn test_handles_are_never_reused() {
    let mut t = TestDum::new();
    t.deliver_request(inbound(Method::Options)).await;
    let first = t.dum.usage_handles()[0];
    t.dum.respond(first, StatusCode::OK).await.unwrap();

    t.deliver_request(inbound(Method::Options)).await;
    t.deliver_request(inbound(Method::Message)).await;
    let mut handles = t.dum.usage_handles();
    handles.sort_by_key(|h| h.id());

    assert_eq!(handles.len(), 2);
    assert!(!handles.contains(&first));
    assert_ne!(handles[0], handles[1]);
}

#[tokio::test]
async fn test_destroying_the_last_usage_reaps_the_dialog_set() {
    let mut t = TestDum::new();
    let recorder = Recorder::new();
    t.dum.set_invite_session_handler(recorder.clone());
    let (handle, dialog_id) = server_invite(&mut t).await;
    assert!(t.dum.find_dialog(&dialog_id).is_ok());

    assert!(t.dum.destroy_usage(handle));
    assert_eq!(recorder.count("terminated"), 1);
    assert_eq!(
        t.dum.find_dialog(&dialog_id).unwrap_err(),
        DumError::DialogSetNotFound {
            id: dialog_id.dialog_set_id().clone()
        }
    );
    assert_eq!(t.dum.dialog_set_count(), 0);
}

#[tokio::test]
async fn test_session_expiry_destroys_the_usage() {
    let mut t = TestDum::new();
    let (handle, _) = server_invite(&mut t).await;

    assert!(t.deliver_timer(handle, DumTimerKind::SessionExpired).await.is_empty());
    assert!(!t.dum.is_valid(handle));
    assert_eq!(t.dum.dialog_set_count(), 0);
}

#[tokio::test]
async fn test_create_usage_requires_a_known_dialog() {
    let mut t = TestDum::new();
    let trigger = SipMessage::Request(inbound(Method::Options));

    let nowhere = DialogId::new(DialogSetId::new("nobody@example.com", "x"), "y");
    assert!(matches!(
        t.dum.create_usage(UsageKind::ServerOutOfDialogReq, &nowhere, &trigger),
        Err(DumError::DialogSetNotFound { .. })
    ));

    let (_, dialog_id) = server_invite(&mut t).await;
    let stranger = DialogId::new(dialog_id.dialog_set_id().clone(), "stranger");
    assert_eq!(
        t.dum
            .create_usage(UsageKind::ServerOutOfDialogReq, &stranger, &trigger)
            .unwrap_err(),
        DumError::DialogNotFound { id: stranger }
    );
    assert_eq!(t.dum.usage_count(), 1);
}

#[tokio::test]
async fn test_one_usage_per_category() {
    let mut t = TestDum::new();
    let invite = inbound(Method::Invite);
    t.deliver_request(invite.clone()).await;
    let dialog_id = t.dum.get_usage(t.dum.usage_handles()[0]).unwrap().dialog_id().clone();

    let err = t
        .dum
        .create_usage(UsageKind::ServerInviteSession, &dialog_id, &SipMessage::Request(invite))
        .unwrap_err();
    assert!(matches!(err, DumError::InvalidState { .. }));
    assert_eq!(t.dum.usage_count(), 1);
}

#[tokio::test]
async fn test_client_usage_needs_a_creator() {
    let mut t = TestDum::new();
    let (_, dialog_id) = server_invite(&mut t).await;
    let trigger = SipMessage::Request(inbound(Method::Subscribe));

    let err = t
        .dum
        .create_usage(UsageKind::ClientSubscription, &dialog_id, &trigger)
        .unwrap_err();
    assert_eq!(
        err,
        DumError::CreatorNotFound {
            id: dialog_id.dialog_set_id().clone()
        }
    );
    assert!(matches!(
        t.dum.find_creator(&dialog_id),
        Err(DumError::CreatorNotFound { .. })
    ));
}

#[tokio::test]
async fn test_server_usage_added_to_existing_dialog() {
    let mut t = TestDum::new();
    let (_, dialog_id) = server_invite(&mut t).await;
    let trigger = SipMessage::Request(inbound(Method::Refer));

    let handle = t
        .dum
        .create_usage(UsageKind::ServerSubscription, &dialog_id, &trigger)
        .unwrap();
    assert_eq!(t.dum.usage_count(), 2);
    assert_eq!(t.dum.get_usage(handle).unwrap().handler_key(), Some("refer"));
    let dialog = t.dum.find_dialog(&dialog_id).unwrap();
    assert_eq!(dialog.usage_handles().len(), 2);
}

#[tokio::test]
async fn test_destroying_twice_leaves_other_usages_alone() {
    let mut t = TestDum::new();
    let recorder = Recorder::new();
    t.dum.set_invite_session_handler(recorder.clone());
    t.dum.add_out_of_dialog_handler(Method::Options, recorder.clone());
    t.deliver_request(inbound(Method::Invite)).await;
    t.deliver_request(inbound(Method::Options)).await;
    assert_eq!(t.dum.dialog_set_count(), 2);

    let invite = recorder.new_handle(UsageKind::ServerInviteSession).unwrap();
    let options = recorder.new_handle(UsageKind::ServerOutOfDialogReq).unwrap();

    assert!(t.dum.destroy_usage(options));
    assert!(!t.dum.destroy_usage(options));
    assert_eq!(recorder.count("terminated"), 1);

    assert!(t.dum.is_valid(invite));
    assert_eq!(t.dum.usage_handles(), vec![invite]);
    assert_eq!(t.dum.usage_count(), 1);
    assert_eq!(t.dum.dialog_set_count(), 1);
}
