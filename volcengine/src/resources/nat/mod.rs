//! NAT gateway resources

pub mod resource_nat_gateway;

pub use resource_nat_gateway::NatGatewayService;
