//! Check implementations grouped by service

pub mod backup;
pub mod cloudwatch;
pub mod ebs;
pub mod ec2;
pub mod eip;
pub mod iam;
pub mod lambda;
pub mod lb;
pub mod nat;
pub mod rds;
pub mod s3;
pub mod sg;
pub mod snapshots;

use crate::CheckRegistry;
use std::sync::Arc;

/// Register every shipped check
pub fn register_checks(registry: &mut CheckRegistry) {
    // Compute
    registry.register(Arc::new(ec2::StoppedInstancesCheck));
    registry.register(Arc::new(ec2::IdleInstancesCheck));

    // Storage
    registry.register(Arc::new(ebs::OrphanVolumesCheck));
    registry.register(Arc::new(ebs::UnencryptedVolumesCheck));
    registry.register(Arc::new(snapshots::OldSnapshotsCheck));
    registry.register(Arc::new(s3::PublicReadCheck));
    registry.register(Arc::new(s3::UnencryptedBucketsCheck));

    // Network
    registry.register(Arc::new(eip::UnattachedAddressesCheck));
    registry.register(Arc::new(sg::SshRdpOpenCheck));
    registry.register(Arc::new(sg::DatabasePortsOpenCheck));
    registry.register(Arc::new(nat::UnusedGatewaysCheck));
    registry.register(Arc::new(lb::NoHealthyTargetsCheck));

    // Serverless and databases
    registry.register(Arc::new(lambda::UnusedFunctionsCheck));
    registry.register(Arc::new(lambda::OverProvisionedCheck));
    registry.register(Arc::new(rds::IdleInstancesCheck));
    registry.register(Arc::new(rds::PublicInstancesCheck));

    // Identity
    registry.register(Arc::new(iam::RootAccessKeysCheck));
    registry.register(Arc::new(iam::OldAccessKeysCheck));

    // Monitoring and backup
    registry.register(Arc::new(cloudwatch::UnusedAlarmsCheck));
    registry.register(Arc::new(backup::EmptyVaultsCheck));
}
