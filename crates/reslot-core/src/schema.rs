//! Interface schemas.
//!
//! A schema is the static description of what a region exposes: an ordered
//! list of typed member declarations plus the region's load bandwidth.
//! Regions build their region halves from it, module instances build the
//! matching module halves, and split controllers carve out subsets for
//! their groups. Composition is pure data; there is no code generation.
//!
//! ```text
//! Schema::new("dsp", 1024)
//!     .input::<u32>("sample")
//!     .output::<u32>("result")
//!     .target::<Ctrl>("control")
//!     .output_vec::<bool>("flags", 4)
//! ```

use std::any::Any;
use std::marker::PhantomData;
use std::rc::Rc;

use reslot_kernel::{CallChannel, ChannelValue, Signal, Sim};

use crate::adapter::signal_in::{SignalInModuleHalf, SignalInRegionHalf};
use crate::adapter::signal_out::{SignalOutModuleHalf, SignalOutRegionHalf};
use crate::adapter::socket::{SocketModuleHalf, SocketRegionHalf};
use crate::adapter::vector::{VectorModuleHalf, VectorRegionHalf};
use crate::adapter::{ModuleHalf, RegionHalf};
use crate::lock::LockState;

/// Request/response protocol carried by a socket member.
///
/// Forward is the caller-to-callee direction of the member; backward runs
/// the other way. A target member's module serves forward calls and issues
/// backward ones; an initiator member's module is the mirror image.
pub trait Protocol: 'static {
    type FwReq: 'static;
    type FwResp: 'static;
    type BwReq: 'static;
    type BwResp: 'static;
}

/// The pair of call channels a socket member exposes to one side.
///
/// Which channel a given side calls and which it binds depends on the
/// member's orientation; the field names always follow the protocol's
/// forward/backward directions.
pub struct SocketEndpoint<P: Protocol> {
    pub forward: CallChannel<P::FwReq, P::FwResp>,
    pub backward: CallChannel<P::BwReq, P::BwResp>,
}

impl<P: Protocol> Clone for SocketEndpoint<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P: Protocol> Copy for SocketEndpoint<P> {}

/// Instantiates the adapter halves and endpoints for one member kind.
pub(crate) trait MemberBuild {
    fn build_region_half(
        &self,
        sim: &mut Sim,
        owner: &str,
        member: &str,
        lock: &LockState,
    ) -> (Rc<dyn RegionHalf>, Box<dyn Any>);

    fn build_module_half(
        &self,
        sim: &mut Sim,
        owner: &str,
        member: &str,
    ) -> (Rc<dyn ModuleHalf>, Box<dyn Any>);
}

#[derive(Clone)]
pub(crate) struct MemberDecl {
    pub(crate) name: String,
    pub(crate) build: Rc<dyn MemberBuild>,
}

/// Ordered set of member declarations plus the region's load bandwidth.
#[derive(Clone)]
pub struct Schema {
    name: String,
    bandwidth_mbps: u64,
    members: Vec<MemberDecl>,
}

impl Schema {
    /// Creates an empty schema.
    ///
    /// # Panics
    ///
    /// Panics if `bandwidth_mbps` is zero.
    pub fn new(name: &str, bandwidth_mbps: u64) -> Self {
        assert!(
            bandwidth_mbps > 0,
            "schema `{name}` declared with zero bandwidth"
        );
        Self {
            name: name.to_owned(),
            bandwidth_mbps,
            members: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Load bandwidth in megabytes per second.
    pub fn bandwidth_mbps(&self) -> u64 {
        self.bandwidth_mbps
    }

    /// Member names in declaration order.
    pub fn member_names(&self) -> Vec<&str> {
        self.members.iter().map(|decl| decl.name.as_str()).collect()
    }

    pub fn input<T: ChannelValue>(self, name: &str) -> Self {
        self.push(name, Rc::new(InputMember::<T>(PhantomData)))
    }

    pub fn output<T: ChannelValue>(self, name: &str) -> Self {
        self.push(name, Rc::new(OutputMember::<T>(PhantomData)))
    }

    pub fn target<P: Protocol>(self, name: &str) -> Self {
        self.push(name, Rc::new(TargetMember::<P>(PhantomData)))
    }

    pub fn initiator<P: Protocol>(self, name: &str) -> Self {
        self.push(name, Rc::new(InitiatorMember::<P>(PhantomData)))
    }

    pub fn input_vec<T: ChannelValue>(self, name: &str, len: usize) -> Self {
        let elem: Rc<dyn MemberBuild> = Rc::new(InputMember::<T>(PhantomData));
        self.push_vec::<Signal<T>>(name, len, elem)
    }

    pub fn output_vec<T: ChannelValue>(self, name: &str, len: usize) -> Self {
        let elem: Rc<dyn MemberBuild> = Rc::new(OutputMember::<T>(PhantomData));
        self.push_vec::<Signal<T>>(name, len, elem)
    }

    pub fn target_vec<P: Protocol>(self, name: &str, len: usize) -> Self {
        let elem: Rc<dyn MemberBuild> = Rc::new(TargetMember::<P>(PhantomData));
        self.push_vec::<SocketEndpoint<P>>(name, len, elem)
    }

    pub fn initiator_vec<P: Protocol>(self, name: &str, len: usize) -> Self {
        let elem: Rc<dyn MemberBuild> = Rc::new(InitiatorMember::<P>(PhantomData));
        self.push_vec::<SocketEndpoint<P>>(name, len, elem)
    }

    /// Extracts the named members into a new schema with the same
    /// bandwidth, preserving this schema's declaration order.
    ///
    /// # Panics
    ///
    /// Panics on an unknown member name.
    pub fn subset(&self, name: &str, members: &[&str]) -> Schema {
        for wanted in members {
            assert!(
                self.members.iter().any(|decl| decl.name == *wanted),
                "schema `{}` has no member `{wanted}`",
                self.name
            );
        }
        Schema {
            name: name.to_owned(),
            bandwidth_mbps: self.bandwidth_mbps,
            members: self
                .members
                .iter()
                .filter(|decl| members.contains(&decl.name.as_str()))
                .cloned()
                .collect(),
        }
    }

    pub(crate) fn members(&self) -> &[MemberDecl] {
        &self.members
    }

    fn push(mut self, name: &str, build: Rc<dyn MemberBuild>) -> Self {
        assert!(
            !self.members.iter().any(|decl| decl.name == name),
            "schema `{}` declares member `{name}` twice",
            self.name
        );
        self.members.push(MemberDecl {
            name: name.to_owned(),
            build,
        });
        self
    }

    fn push_vec<E: Clone + 'static>(
        self,
        name: &str,
        len: usize,
        elem: Rc<dyn MemberBuild>,
    ) -> Self {
        self.push(
            name,
            Rc::new(VectorMember::<E> {
                len,
                elem,
                _marker: PhantomData,
            }),
        )
    }
}

// ============================================================================
// Member kinds
// ============================================================================

struct InputMember<T>(PhantomData<fn() -> T>);

impl<T: ChannelValue> MemberBuild for InputMember<T> {
    fn build_region_half(
        &self,
        sim: &mut Sim,
        owner: &str,
        member: &str,
        _lock: &LockState,
    ) -> (Rc<dyn RegionHalf>, Box<dyn Any>) {
        let half = SignalInRegionHalf::<T>::new(sim, owner, member);
        let external = half.external();
        (half, Box::new(external))
    }

    fn build_module_half(
        &self,
        sim: &mut Sim,
        owner: &str,
        member: &str,
    ) -> (Rc<dyn ModuleHalf>, Box<dyn Any>) {
        let half = SignalInModuleHalf::<T>::new(sim, owner, member);
        let endpoint = half.inner;
        (half, Box::new(endpoint))
    }
}

struct OutputMember<T>(PhantomData<fn() -> T>);

impl<T: ChannelValue> MemberBuild for OutputMember<T> {
    fn build_region_half(
        &self,
        sim: &mut Sim,
        owner: &str,
        member: &str,
        _lock: &LockState,
    ) -> (Rc<dyn RegionHalf>, Box<dyn Any>) {
        let half = SignalOutRegionHalf::<T>::new(sim, owner, member);
        let external = half.external();
        (half, Box::new(external))
    }

    fn build_module_half(
        &self,
        sim: &mut Sim,
        owner: &str,
        member: &str,
    ) -> (Rc<dyn ModuleHalf>, Box<dyn Any>) {
        let half = SignalOutModuleHalf::<T>::new(sim, owner, member);
        let endpoint = half.inner;
        (half, Box::new(endpoint))
    }
}

struct TargetMember<P>(PhantomData<fn() -> P>);

impl<P: Protocol> MemberBuild for TargetMember<P> {
    fn build_region_half(
        &self,
        sim: &mut Sim,
        owner: &str,
        member: &str,
        lock: &LockState,
    ) -> (Rc<dyn RegionHalf>, Box<dyn Any>) {
        // Forward calls enter from outside, backward calls exit.
        let half =
            SocketRegionHalf::<P::FwReq, P::FwResp, P::BwReq, P::BwResp>::new(
                sim, owner, member, lock,
            );
        let (ext_in, ext_out) = half.external();
        let endpoint = SocketEndpoint::<P> {
            forward: ext_in,
            backward: ext_out,
        };
        (half, Box::new(endpoint))
    }

    fn build_module_half(
        &self,
        sim: &mut Sim,
        owner: &str,
        member: &str,
    ) -> (Rc<dyn ModuleHalf>, Box<dyn Any>) {
        let half = SocketModuleHalf::<P::FwReq, P::FwResp, P::BwReq, P::BwResp>::new(
            sim, owner, member,
        );
        let endpoint = SocketEndpoint::<P> {
            forward: half.inner_in,
            backward: half.inner_out,
        };
        (half, Box::new(endpoint))
    }
}

struct InitiatorMember<P>(PhantomData<fn() -> P>);

impl<P: Protocol> MemberBuild for InitiatorMember<P> {
    fn build_region_half(
        &self,
        sim: &mut Sim,
        owner: &str,
        member: &str,
        lock: &LockState,
    ) -> (Rc<dyn RegionHalf>, Box<dyn Any>) {
        // Backward calls enter from outside, forward calls exit.
        let half =
            SocketRegionHalf::<P::BwReq, P::BwResp, P::FwReq, P::FwResp>::new(
                sim, owner, member, lock,
            );
        let (ext_in, ext_out) = half.external();
        let endpoint = SocketEndpoint::<P> {
            forward: ext_out,
            backward: ext_in,
        };
        (half, Box::new(endpoint))
    }

    fn build_module_half(
        &self,
        sim: &mut Sim,
        owner: &str,
        member: &str,
    ) -> (Rc<dyn ModuleHalf>, Box<dyn Any>) {
        let half = SocketModuleHalf::<P::BwReq, P::BwResp, P::FwReq, P::FwResp>::new(
            sim, owner, member,
        );
        let endpoint = SocketEndpoint::<P> {
            forward: half.inner_out,
            backward: half.inner_in,
        };
        (half, Box::new(endpoint))
    }
}

/// Vector of a single element kind; `E` is the element endpoint type, so
/// the assembled endpoint downcasts as `Vec<E>`.
struct VectorMember<E> {
    len: usize,
    elem: Rc<dyn MemberBuild>,
    _marker: PhantomData<fn() -> E>,
}

impl<E: Clone + 'static> MemberBuild for VectorMember<E> {
    fn build_region_half(
        &self,
        sim: &mut Sim,
        owner: &str,
        member: &str,
        lock: &LockState,
    ) -> (Rc<dyn RegionHalf>, Box<dyn Any>) {
        let mut lanes = Vec::with_capacity(self.len);
        let mut endpoints = Vec::with_capacity(self.len);
        for i in 0..self.len {
            let lane_name = format!("{member}[{i}]");
            let (half, endpoint) = self.elem.build_region_half(sim, owner, &lane_name, lock);
            lanes.push(half);
            endpoints.push(downcast_endpoint::<E>(owner, &lane_name, endpoint));
        }
        let half = VectorRegionHalf::new(sim, owner, member, lanes);
        (half, Box::new(endpoints))
    }

    fn build_module_half(
        &self,
        sim: &mut Sim,
        owner: &str,
        member: &str,
    ) -> (Rc<dyn ModuleHalf>, Box<dyn Any>) {
        let mut lanes = Vec::with_capacity(self.len);
        let mut endpoints = Vec::with_capacity(self.len);
        for i in 0..self.len {
            let lane_name = format!("{member}[{i}]");
            let (half, endpoint) = self.elem.build_module_half(sim, owner, &lane_name);
            lanes.push(half);
            endpoints.push(downcast_endpoint::<E>(owner, &lane_name, endpoint));
        }
        let half = VectorModuleHalf::new(member, lanes);
        (half, Box::new(endpoints))
    }
}

fn downcast_endpoint<E: 'static>(owner: &str, member: &str, endpoint: Box<dyn Any>) -> E {
    match endpoint.downcast::<E>() {
        Ok(endpoint) => *endpoint,
        Err(_) => panic!("member `{owner}.{member}` built an endpoint of an unexpected type"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ctrl;

    impl Protocol for Ctrl {
        type FwReq = u32;
        type FwResp = u32;
        type BwReq = ();
        type BwResp = ();
    }

    fn sample() -> Schema {
        Schema::new("dsp", 1024)
            .input::<u32>("sample")
            .output::<u32>("result")
            .target::<Ctrl>("control")
    }

    #[test]
    fn members_keep_declaration_order() {
        assert_eq!(
            sample().member_names(),
            vec!["sample", "result", "control"]
        );
    }

    #[test]
    fn subset_preserves_order_and_bandwidth() {
        let sub = sample().subset("dsp.data", &["result", "sample"]);
        assert_eq!(sub.member_names(), vec!["sample", "result"]);
        assert_eq!(sub.bandwidth_mbps(), 1024);
    }

    #[test]
    #[should_panic(expected = "has no member `bogus`")]
    fn subset_of_unknown_member_panics() {
        let _ = sample().subset("bad", &["bogus"]);
    }

    #[test]
    #[should_panic(expected = "declares member `sample` twice")]
    fn duplicate_member_panics() {
        let _ = sample().input::<bool>("sample");
    }

    #[test]
    #[should_panic(expected = "declared with zero bandwidth")]
    fn zero_bandwidth_panics() {
        let _ = Schema::new("broken", 0);
    }
}
