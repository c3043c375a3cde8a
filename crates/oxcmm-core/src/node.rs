//! Filter graph nodes
//!
//! A [`FilterNode`] owns its plugs (inputs) and sockets (outputs). Both
//! point back at the node through a `Weak`, so a graph of nodes never forms
//! an ownership cycle: a plug owns the socket it is connected to, a socket
//! only remembers its requesting plugs weakly.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::connector::Connector;
use crate::conversion::Feedback;
use crate::error::{Error, Result};
use crate::filter::Filter;
use crate::image::Image;
use crate::message::report;
use crate::module::{FilterFactory, Signal};
use crate::object::{NameKind, Object, ObjectKind, Struct};
use crate::options::Options;
use crate::pixel_access::PixelAccess;

/// Lifecycle of a plug
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlugStatus {
    Unconnected,
    Connected,
    /// Terminal: the plug cannot connect again
    Released,
}

enum PlugState {
    Unconnected,
    Connected(Arc<Socket>),
    Released,
}

/// Output endpoint of a node
pub struct Socket {
    object: Object,
    node: Weak<FilterNode>,
    index: usize,
    connector: Connector,
    image: RwLock<Option<Arc<Image>>>,
    requesters: Mutex<Vec<Weak<Plug>>>,
}

impl Socket {
    pub fn node(&self) -> Option<Arc<FilterNode>> {
        self.node.upgrade()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    pub fn image(&self) -> Option<Arc<Image>> {
        self.image.read().clone()
    }

    pub fn set_image(&self, image: Option<Arc<Image>>) {
        *self.image.write() = image;
    }

    /// Plugs currently connected to this socket
    pub fn requesters(&self) -> Vec<Arc<Plug>> {
        self.requesters.lock().iter().filter_map(Weak::upgrade).collect()
    }

    fn add_requester(&self, plug: &Arc<Plug>) {
        let mut requesters = self.requesters.lock();
        requesters.retain(|p| p.strong_count() > 0);
        requesters.push(Arc::downgrade(plug));
    }

    fn remove_requester(&self, plug: &Plug) {
        self.requesters
            .lock()
            .retain(|p| p.upgrade().is_some_and(|p| !std::ptr::eq(Arc::as_ptr(&p), plug)));
    }
}

impl Struct for Socket {
    fn object(&self) -> &Object {
        &self.object
    }
}

/// Input endpoint of a node
pub struct Plug {
    object: Object,
    node: Weak<FilterNode>,
    index: usize,
    connector: Connector,
    state: Mutex<PlugState>,
}

impl Plug {
    pub fn node(&self) -> Option<Arc<FilterNode>> {
        self.node.upgrade()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn connector(&self) -> &Connector {
        &self.connector
    }

    pub fn status(&self) -> PlugStatus {
        match *self.state.lock() {
            PlugState::Unconnected => PlugStatus::Unconnected,
            PlugState::Connected(_) => PlugStatus::Connected,
            PlugState::Released => PlugStatus::Released,
        }
    }

    pub fn socket(&self) -> Option<Arc<Socket>> {
        match &*self.state.lock() {
            PlugState::Connected(socket) => Some(socket.clone()),
            _ => None,
        }
    }

    /// Connect to `socket`, detaching from any previous one first.
    ///
    /// Both nodes' factories see [`Signal::Connected`]; a detached socket's
    /// node sees [`Signal::Released`].
    pub fn connect(self: &Arc<Self>, socket: &Arc<Socket>) -> Result<()> {
        let previous = {
            let mut state = self.state.lock();
            if matches!(*state, PlugState::Released) {
                return Err(Error::PlugReleased);
            }
            std::mem::replace(&mut *state, PlugState::Connected(socket.clone()))
        };
        if let PlugState::Connected(old) = previous {
            old.remove_requester(self);
            self.notify(&old, Signal::Released);
        }
        socket.add_requester(self);
        tracing::debug!(plug = self.object.id(), socket = socket.object.id(), "plug connected");
        self.notify(socket, Signal::Connected);
        Ok(())
    }

    /// Disconnect for good. Releasing twice is a no-op.
    pub fn release(self: &Arc<Self>) {
        let previous = std::mem::replace(&mut *self.state.lock(), PlugState::Released);
        if let PlugState::Connected(socket) = previous {
            socket.remove_requester(self);
            tracing::debug!(plug = self.object.id(), socket = socket.object.id(), "plug released");
            self.notify(&socket, Signal::Released);
        }
    }

    fn notify(&self, socket: &Socket, signal: Signal) {
        if let Some(node) = self.node() {
            node.signal(signal);
        }
        if let Some(node) = socket.node() {
            node.signal(signal);
        }
    }
}

impl Struct for Plug {
    fn object(&self) -> &Object {
        &self.object
    }
}

/// One instance of a filter inside a graph
pub struct FilterNode {
    object: Object,
    filter: Arc<Filter>,
    plugs: Vec<Arc<Plug>>,
    sockets: Vec<Arc<Socket>>,
    context: Mutex<Option<Arc<dyn Struct>>>,
}

impl FilterNode {
    /// Instantiate `filter` with the plugs and sockets its connectors allow
    pub fn create(filter: &Arc<Filter>) -> Arc<FilterNode> {
        let connectors = filter.factory().connectors();
        let node = Arc::new_cyclic(|weak: &Weak<FilterNode>| {
            let object = Object::new(ObjectKind::FilterNode);
            object.set_name(NameKind::Nick, filter.name());
            let plugs = (0..connectors.plug_count())
                .filter_map(|i| connectors.plug(i).map(|c| (i, c)))
                .map(|(index, connector)| {
                    Arc::new(Plug {
                        object: Object::with_parent(ObjectKind::Plug, &object),
                        node: weak.clone(),
                        index,
                        connector: connector.clone(),
                        state: Mutex::new(PlugState::Unconnected),
                    })
                })
                .collect();
            let sockets = (0..connectors.socket_count())
                .filter_map(|i| connectors.socket(i).map(|c| (i, c)))
                .map(|(index, connector)| {
                    Arc::new(Socket {
                        object: Object::with_parent(ObjectKind::Socket, &object),
                        node: weak.clone(),
                        index,
                        connector: connector.clone(),
                        image: RwLock::new(None),
                        requesters: Mutex::new(Vec::new()),
                    })
                })
                .collect();
            FilterNode {
                object,
                filter: filter.clone(),
                plugs,
                sockets,
                context: Mutex::new(None),
            }
        });
        tracing::debug!(
            id = node.id(),
            filter = filter.registration(),
            plugs = node.plug_count(),
            sockets = node.socket_count(),
            "filter node created"
        );
        node
    }

    pub fn id(&self) -> u32 {
        self.object.id()
    }

    pub fn filter(&self) -> &Arc<Filter> {
        &self.filter
    }

    pub fn factory(&self) -> &Arc<dyn FilterFactory> {
        self.filter.factory()
    }

    pub fn options(&self) -> &Options {
        self.filter.options()
    }

    pub fn plug(&self, index: usize) -> Option<Arc<Plug>> {
        self.plugs.get(index).cloned()
    }

    pub fn socket(&self, index: usize) -> Option<Arc<Socket>> {
        self.sockets.get(index).cloned()
    }

    pub fn plug_count(&self) -> usize {
        self.plugs.len()
    }

    pub fn socket_count(&self) -> usize {
        self.sockets.len()
    }

    /// Image at the socket plug `index` is connected to
    pub fn upstream_image(&self, index: usize) -> Option<Arc<Image>> {
        self.plug(index)?.socket()?.image()
    }

    /// Image attached to the first downstream node's socket
    pub fn downstream_image(&self, index: usize) -> Option<Arc<Image>> {
        self.socket(index)?
            .requesters()
            .into_iter()
            .filter_map(|plug| plug.node())
            .find_map(|node| node.socket(0)?.image())
    }

    /// Backend context, created by the factory on first use
    pub fn context(&self) -> Result<Option<Arc<dyn Struct>>> {
        let mut slot = self.context.lock();
        if slot.is_none() {
            *slot = self.factory().create_context(self)?;
        }
        Ok(slot.clone())
    }

    /// Drop the context so the next run rebuilds it
    pub fn reset_context(&self) {
        self.context.lock().take();
    }

    fn signal(&self, signal: Signal) {
        self.reset_context();
        self.factory().on_signal(self, signal);
    }

    /// Produce the block described by `ticket`
    pub fn run(&self, ticket: &mut PixelAccess) -> Feedback {
        if let Err(e) = self.context() {
            report!(Error, Some(&self.object), "context creation failed: {}", e);
            return Feedback::Failed(e.code());
        }
        let feedback = self.factory().run(self, ticket);
        tracing::trace!(node = self.id(), ?feedback, start = ?ticket.start(), "node ran");
        feedback
    }

    /// Let the node connected to plug `index` produce into `ticket`
    pub fn pull_upstream(&self, index: usize, ticket: &mut PixelAccess) -> Feedback {
        let upstream = self
            .plug(index)
            .and_then(|plug| plug.socket())
            .and_then(|socket| socket.node());
        match upstream {
            Some(node) => node.run(ticket),
            None => {
                report!(Warning, Some(&self.object), "plug {} has no upstream node", index);
                Feedback::Failed(Error::NoInputImage.code())
            }
        }
    }
}

impl Struct for FilterNode {
    fn object(&self) -> &Object {
        &self.object
    }
}

impl fmt::Debug for FilterNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterNode")
            .field("id", &self.id())
            .field("filter", &self.filter.registration())
            .field("plugs", &self.plugs.len())
            .field("sockets", &self.sockets.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{Connector, Connectors};
    use crate::module::{ApiEntry, Module, ModuleCode, ModuleRegistry};
    use crate::config::Config;
    use parking_lot::Mutex as PlMutex;

    struct Recorder {
        connectors: Connectors,
        signals: PlMutex<Vec<(u32, Signal)>>,
    }

    impl FilterFactory for Recorder {
        fn registration(&self) -> &str {
            "org/oxcmm/imaging/recorder.test"
        }
        fn name(&self) -> &str {
            "recorder"
        }
        fn category(&self) -> &str {
            "test"
        }
        fn connectors(&self) -> &Connectors {
            &self.connectors
        }
        fn run(&self, _node: &FilterNode, _ticket: &mut PixelAccess) -> Feedback {
            Feedback::End
        }
        fn on_signal(&self, node: &FilterNode, signal: Signal) {
            self.signals.lock().push((node.id(), signal));
        }
    }

    fn recording_filter_with(connectors: Connectors) -> (Arc<Recorder>, Arc<Filter>) {
        let recorder = Arc::new(Recorder {
            connectors,
            signals: PlMutex::new(Vec::new()),
        });
        let registry = Arc::new(ModuleRegistry::new(&Config::default()));
        registry.register_static(
            Module::new(ModuleCode::new(*b"rcdr"), "recorder", "1").with_api(ApiEntry::Filter(recorder.clone())),
        );
        let filter = Filter::new("//imaging/recorder", None, None, &registry).unwrap();
        (recorder, filter)
    }

    fn recording_filter() -> (Arc<Recorder>, Arc<Filter>) {
        let mut connectors = Connectors::new(vec![Connector::plug("in")], vec![Connector::socket("out")]);
        connectors.extra_plugs = 2;
        recording_filter_with(connectors)
    }

    #[test]
    fn test_counts_and_back_references() {
        let (_recorder, filter) = recording_filter();
        let node = FilterNode::create(&filter);
        assert_eq!(node.plug_count(), 2);
        assert_eq!(node.socket_count(), 1);
        let plug = node.plug(1).unwrap();
        assert_eq!(plug.node().unwrap().id(), node.id());

        let weak = Arc::downgrade(&node);
        drop(node);
        assert!(weak.upgrade().is_none());
        assert!(plug.node().is_none());
    }

    #[test]
    fn test_connect_signals_and_release() {
        let (recorder, filter) = recording_filter();
        let a = FilterNode::create(&filter);
        let b = FilterNode::create(&filter);
        let c = FilterNode::create(&filter);
        let plug = b.plug(0).unwrap();

        plug.connect(&a.socket(0).unwrap()).unwrap();
        assert_eq!(plug.status(), PlugStatus::Connected);
        assert_eq!(a.socket(0).unwrap().requesters().len(), 1);
        {
            let signals = recorder.signals.lock();
            assert!(signals.contains(&(a.id(), Signal::Connected)));
            assert!(signals.contains(&(b.id(), Signal::Connected)));
        }

        // reconnecting detaches from the old socket
        plug.connect(&c.socket(0).unwrap()).unwrap();
        assert!(a.socket(0).unwrap().requesters().is_empty());
        assert!(recorder.signals.lock().contains(&(a.id(), Signal::Released)));

        plug.release();
        assert_eq!(plug.status(), PlugStatus::Released);
        assert!(c.socket(0).unwrap().requesters().is_empty());
        assert!(matches!(plug.connect(&a.socket(0).unwrap()), Err(Error::PlugReleased)));
        plug.release();
    }

    #[test]
    fn test_pull_without_upstream_fails() {
        let (_recorder, filter) = recording_filter();
        let node = FilterNode::create(&filter);
        let image = Image::create(
            1,
            1,
            None,
            crate::layout::PixelLayout::new(3, crate::layout::DataType::U8),
            crate::profile::Profile::from_signature(crate::icc::ColorSpace::Rgb),
        )
        .unwrap();
        let mut ticket = PixelAccess::create(0, 0, &image, crate::pixel_access::AccessKind::Point);
        assert_eq!(
            node.pull_upstream(0, &mut ticket),
            Feedback::Failed(Error::NoInputImage.code())
        );
        assert_eq!(node.run(&mut ticket), Feedback::End);
    }

    #[test]
    fn test_template_sockets_keep_declared_channel_types() {
        use crate::connector::connector_match;
        use crate::layout::ChannelType::{Alpha, ColorLightness as CL};

        let rgba = |c: Connector| c.with_channels(3, 4).with_channel_types(&[CL, CL, CL, Alpha]);
        let (_recorder, filter) = recording_filter_with(Connectors::new(
            vec![rgba(Connector::plug("in"))],
            vec![rgba(Connector::socket("out"))],
        ));
        let a = FilterNode::create(&filter);
        let b = FilterNode::create(&filter);
        let plug = b.plug(0).unwrap();
        assert!(connector_match(&a, 0, plug.connector()));

        // a socket declaring fewer types than channels is padded, not truncated
        let (_recorder, rgb) = recording_filter_with(Connectors::new(
            vec![Connector::plug("in")],
            vec![Connector::socket("out").with_channels(4, 4).with_channel_types(&[CL])],
        ));
        let padded = FilterNode::create(&rgb);
        assert!(!connector_match(&padded, 0, plug.connector()));
        let three = Connector::plug("in").with_channels(4, 4).with_channel_types(&[CL, CL, CL]);
        assert!(connector_match(&padded, 0, &three));
    }
}
