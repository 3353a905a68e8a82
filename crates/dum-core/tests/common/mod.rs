//! Shared helpers for dum-core integration tests
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use rvoip_dum_core::handler::{
    ClientRegistrationHandler, ClientSubscriptionHandler, InviteSessionHandler, OutOfDialogHandler,
    ServerSubscriptionHandler,
};
use rvoip_dum_core::message::request_builders::{create_test_request, generate_branch};
use rvoip_dum_core::message::response_builders::create_response;
use rvoip_dum_core::message::{CSeq, HeaderAccess, TypedHeader, Via};
use rvoip_dum_core::{
    ChannelStack, ChannelStackHandle, DialogSetId, DialogUsageManager, DumConfig, DumEvent, DumTimer,
    DumTimerKind, Method, Request, Response, SipMessage, StatusCode, UsageHandle, UsageKind,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A manager wired to an in-memory stack
pub struct TestDum {
    pub dum: DialogUsageManager,
    pub wire: ChannelStackHandle,
}

impl TestDum {
    pub fn new() -> Self {
        init_tracing();
        let (stack, wire) = ChannelStack::new();
        Self {
            dum: DialogUsageManager::new(stack),
            wire,
        }
    }

    pub fn with_config(config: DumConfig) -> Self {
        init_tracing();
        let (stack, wire) = ChannelStack::new();
        Self {
            dum: DialogUsageManager::with_config(stack, config).expect("valid config"),
            wire,
        }
    }

    /// Handle one event and return everything it sent
    pub async fn deliver(&mut self, event: DumEvent) -> Vec<SipMessage> {
        self.dum.handle_event(event).await.expect("event handled");
        self.wire.drain_sent()
    }

    pub async fn deliver_request(&mut self, request: Request) -> Vec<SipMessage> {
        self.deliver(DumEvent::Request(request)).await
    }

    pub async fn deliver_response(&mut self, response: Response) -> Vec<SipMessage> {
        self.deliver(DumEvent::Response(response)).await
    }

    pub async fn deliver_timer(&mut self, handle: UsageHandle, kind: DumTimerKind) -> Vec<SipMessage> {
        self.deliver(DumEvent::Timer(DumTimer::new(handle, kind))).await
    }

    /// Everything the manager sent since the last check
    pub fn sent(&mut self) -> Vec<SipMessage> {
        self.wire.drain_sent()
    }
}

/// The only message sent, as a response
pub fn single_response(sent: &[SipMessage]) -> &Response {
    assert_eq!(sent.len(), 1, "expected exactly one message, got {:?}", sent);
    sent[0].as_response().expect("a response")
}

/// The only message sent, as a request
pub fn single_request(sent: &[SipMessage]) -> &Request {
    assert_eq!(sent.len(), 1, "expected exactly one message, got {:?}", sent);
    sent[0].as_request().expect("a request")
}

/// Dialog-creating request from alice@example.com to bob@example.net
pub fn inbound(method: Method) -> Request {
    create_test_request(method)
}

/// Follow-up request from the peer inside the dialog `initial` created
///
/// `local_tag` is the tag we answered `initial` with; it comes back as the
/// To tag.
pub fn in_dialog(initial: &Request, local_tag: &str, method: Method, seq: u32) -> Request {
    let mut request = initial.clone();
    request.method = method.clone();
    request.body = Default::default();
    request.headers.retain(|h| {
        matches!(
            h,
            TypedHeader::Via(_)
                | TypedHeader::From(_)
                | TypedHeader::To(_)
                | TypedHeader::CallId(_)
                | TypedHeader::CSeq(_)
                | TypedHeader::MaxForwards(_)
        )
    });
    for header in request.headers.iter_mut() {
        if let TypedHeader::To(to) = header {
            to.set_tag(local_tag);
        }
    }
    request.set_header(TypedHeader::CSeq(CSeq::new(seq, method)));
    request.set_header(TypedHeader::Via(Via::new("UDP", "client.example.com", generate_branch())));
    request
}

/// Response from the peer to a request we sent
pub fn response_to(request: &Request, status: StatusCode, to_tag: Option<&str>) -> Response {
    let response = create_response(request, status);
    match to_tag {
        Some(tag) => response.with_to_tag(tag),
        None => response,
    }
}

/// Request from a peer inside a client dialog: To carries our tag, From the peer's
pub fn from_peer(ours: &Request, peer_tag: &str, method: Method, seq: u32) -> Request {
    let our_from = HeaderAccess::from(ours).expect("From").clone();
    let our_to = ours.to().expect("To").clone().with_tag(peer_tag);
    let mut request = Request::new(method.clone(), our_from.uri.clone())
        .with_header(TypedHeader::Via(Via::new("UDP", "peer.example.net", generate_branch())))
        .with_header(TypedHeader::MaxForwards(70))
        .with_header(TypedHeader::From(our_to))
        .with_header(TypedHeader::To(our_from))
        .with_header(TypedHeader::CallId(ours.call_id().expect("Call-ID").to_string()))
        .with_header(TypedHeader::CSeq(CSeq::new(seq, method)));
    if let Some(event) = ours.event() {
        request.set_header(TypedHeader::Event(event.to_string()));
    }
    request
}

pub fn set_id_of(ours: &Request) -> DialogSetId {
    DialogSetId::from_outbound_request(ours).expect("outbound request id")
}

/// Records every handler callback as a line of text
#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<String>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }

    /// Handle reported by the first matching `new` callback
    pub fn new_handle(&self, kind: UsageKind) -> Option<UsageHandle> {
        let prefix = format!("new {} ", kind);
        self.events().iter().find_map(|e| {
            e.strip_prefix(&prefix)
                .and_then(|id| id.parse::<u64>().ok())
                .map(UsageHandle::from_raw)
        })
    }
}

impl InviteSessionHandler for Recorder {
    fn on_new_session(&self, handle: UsageHandle, kind: UsageKind, _message: &SipMessage) {
        self.push(format!("new {} {}", kind, handle.id()));
    }

    fn on_terminated(&self, handle: UsageHandle) {
        self.push(format!("terminated {}", handle.id()));
    }

    fn on_failure(&self, _dialog_set: &DialogSetId, response: &Response) {
        self.push(format!("failure {}", response.status().as_u16()));
    }
}

impl ClientRegistrationHandler for Recorder {
    fn on_new(&self, handle: UsageHandle, _message: &SipMessage) {
        self.push(format!("new {} {}", UsageKind::ClientRegistration, handle.id()));
    }

    fn on_terminated(&self, handle: UsageHandle) {
        self.push(format!("terminated {}", handle.id()));
    }

    fn on_failure(&self, _dialog_set: &DialogSetId, response: &Response) {
        self.push(format!("failure {}", response.status().as_u16()));
    }
}

impl ClientSubscriptionHandler for Recorder {
    fn on_new(&self, handle: UsageHandle, _message: &SipMessage) {
        self.push(format!("new {} {}", UsageKind::ClientSubscription, handle.id()));
    }

    fn on_terminated(&self, handle: UsageHandle) {
        self.push(format!("terminated {}", handle.id()));
    }

    fn on_failure(&self, _dialog_set: &DialogSetId, response: &Response) {
        self.push(format!("failure {}", response.status().as_u16()));
    }
}

impl ServerSubscriptionHandler for Recorder {
    fn on_new(&self, handle: UsageHandle, _message: &SipMessage) {
        self.push(format!("new {} {}", UsageKind::ServerSubscription, handle.id()));
    }

    fn on_terminated(&self, handle: UsageHandle) {
        self.push(format!("terminated {}", handle.id()));
    }
}

impl OutOfDialogHandler for Recorder {
    fn on_new(&self, handle: UsageHandle, kind: UsageKind, _message: &SipMessage) {
        self.push(format!("new {} {}", kind, handle.id()));
    }

    fn on_terminated(&self, handle: UsageHandle) {
        self.push(format!("terminated {}", handle.id()));
    }

    fn on_failure(&self, _dialog_set: &DialogSetId, response: &Response) {
        self.push(format!("failure {}", response.status().as_u16()));
    }
}
