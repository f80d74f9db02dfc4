//! Read-only views of cloud resources returned by the provider boundary

use crate::exclusion::Tags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A resource that can be matched against exclusion rules
pub trait TaggedResource {
    /// Provider-native identifier
    fn resource_id(&self) -> &str;

    /// Resource tags
    fn tags(&self) -> &Tags;

    /// Normalized ARN for this resource
    fn arn(&self, account_id: &str, region: &str) -> String;
}

/// Lifecycle state of a compute instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    Terminated,
}

/// Compute instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub id: String,
    pub instance_type: String,
    pub state: InstanceState,
    /// When the instance entered its current state
    #[serde(default)]
    pub state_since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Tags,
}

impl TaggedResource for Instance {
    fn resource_id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }

    fn arn(&self, account_id: &str, region: &str) -> String {
        format!("arn:aws:ec2:{}:{}:instance/{}", region, account_id, self.id)
    }
}

/// Block storage volume
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    pub id: String,
    pub volume_type: String,
    pub size_gib: u64,
    /// `available` means detached
    pub state: String,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub tags: Tags,
}

impl TaggedResource for Volume {
    fn resource_id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }

    fn arn(&self, account_id: &str, region: &str) -> String {
        format!("arn:aws:ec2:{}:{}:volume/{}", region, account_id, self.id)
    }
}

/// Elastic IP allocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Address {
    pub allocation_id: String,
    pub public_ip: String,
    #[serde(default)]
    pub instance_id: Option<String>,
    #[serde(default)]
    pub network_interface_id: Option<String>,
    #[serde(default)]
    pub tags: Tags,
}

impl TaggedResource for Address {
    fn resource_id(&self) -> &str {
        &self.allocation_id
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }

    fn arn(&self, account_id: &str, region: &str) -> String {
        format!(
            "arn:aws:ec2:{}:{}:elastic-ip/{}",
            region, account_id, self.allocation_id
        )
    }
}

/// Inbound rule of a security group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngressRule {
    /// `tcp`, `udp`, or `-1` for all traffic
    pub protocol: String,
    #[serde(default)]
    pub from_port: Option<u16>,
    #[serde(default)]
    pub to_port: Option<u16>,
    #[serde(default)]
    pub cidrs: Vec<String>,
}

impl IngressRule {
    /// Whether the rule admits traffic from anywhere
    pub fn open_to_world(&self) -> bool {
        self.cidrs.iter().any(|c| c == "0.0.0.0/0" || c == "::/0")
    }

    /// Whether `port` falls within the rule's range
    pub fn covers_port(&self, port: u16) -> bool {
        if self.protocol == "-1" {
            return true;
        }
        let from = self.from_port.unwrap_or(0);
        let to = self.to_port.unwrap_or(u16::MAX);
        from <= port && port <= to
    }
}

/// Security group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityGroup {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub ingress: Vec<IngressRule>,
    #[serde(default)]
    pub tags: Tags,
}

impl TaggedResource for SecurityGroup {
    fn resource_id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }

    fn arn(&self, account_id: &str, region: &str) -> String {
        format!(
            "arn:aws:ec2:{}:{}:security-group/{}",
            region, account_id, self.id
        )
    }
}

/// Object storage bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bucket {
    pub name: String,
    #[serde(default)]
    pub public_read: bool,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default)]
    pub tags: Tags,
}

impl TaggedResource for Bucket {
    fn resource_id(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }

    fn arn(&self, _account_id: &str, _region: &str) -> String {
        format!("arn:aws:s3:::{}", self.name)
    }
}

/// Volume snapshot owned by the account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    #[serde(default)]
    pub volume_id: Option<String>,
    pub start_time: DateTime<Utc>,
    pub size_gib: u64,
    #[serde(default)]
    pub tags: Tags,
}

impl TaggedResource for Snapshot {
    fn resource_id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }

    fn arn(&self, account_id: &str, region: &str) -> String {
        format!("arn:aws:ec2:{}:{}:snapshot/{}", region, account_id, self.id)
    }
}

/// Serverless function
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    pub memory_mb: u32,
    #[serde(default)]
    pub runtime: Option<String>,
    #[serde(default)]
    pub tags: Tags,
}

impl TaggedResource for Function {
    fn resource_id(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }

    fn arn(&self, account_id: &str, region: &str) -> String {
        format!(
            "arn:aws:lambda:{}:{}:function:{}",
            region, account_id, self.name
        )
    }
}

/// Managed database instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbInstance {
    pub id: String,
    pub instance_class: String,
    pub engine: String,
    #[serde(default)]
    pub publicly_accessible: bool,
    #[serde(default)]
    pub tags: Tags,
}

impl TaggedResource for DbInstance {
    fn resource_id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }

    fn arn(&self, account_id: &str, region: &str) -> String {
        format!("arn:aws:rds:{}:{}:db:{}", region, account_id, self.id)
    }
}

/// IAM user access key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessKey {
    pub user_name: String,
    pub key_id: String,
    #[serde(default = "default_key_status")]
    pub status: String,
    pub created: DateTime<Utc>,
    #[serde(default)]
    pub tags: Tags,
}

fn default_key_status() -> String {
    "Active".to_string()
}

impl AccessKey {
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}

impl TaggedResource for AccessKey {
    fn resource_id(&self) -> &str {
        &self.key_id
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }

    fn arn(&self, account_id: &str, _region: &str) -> String {
        format!("arn:aws:iam::{}:user/{}", account_id, self.user_name)
    }
}

/// Managed NAT gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NatGateway {
    pub id: String,
    /// `available` once provisioned
    pub state: String,
    #[serde(default)]
    pub vpc_id: Option<String>,
    #[serde(default)]
    pub subnet_id: Option<String>,
    #[serde(default)]
    pub tags: Tags,
}

impl TaggedResource for NatGateway {
    fn resource_id(&self) -> &str {
        &self.id
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }

    fn arn(&self, account_id: &str, region: &str) -> String {
        format!("arn:aws:ec2:{}:{}:natgateway/{}", region, account_id, self.id)
    }
}

/// Target group attached to a load balancer, with its health counts
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TargetGroup {
    pub name: String,
    #[serde(default)]
    pub healthy_targets: u32,
    #[serde(default)]
    pub unhealthy_targets: u32,
}

/// Application or network load balancer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadBalancer {
    pub name: String,
    /// `application` or `network`
    #[serde(default = "default_lb_type")]
    pub lb_type: String,
    #[serde(default = "default_lb_scheme")]
    pub scheme: String,
    #[serde(default)]
    pub target_groups: Vec<TargetGroup>,
    #[serde(default)]
    pub tags: Tags,
}

fn default_lb_type() -> String {
    "application".to_string()
}

fn default_lb_scheme() -> String {
    "internet-facing".to_string()
}

impl LoadBalancer {
    pub fn healthy_targets(&self) -> u32 {
        self.target_groups.iter().map(|tg| tg.healthy_targets).sum()
    }
}

impl TaggedResource for LoadBalancer {
    fn resource_id(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }

    fn arn(&self, account_id: &str, region: &str) -> String {
        let kind = if self.lb_type == "network" { "net" } else { "app" };
        format!(
            "arn:aws:elasticloadbalancing:{}:{}:loadbalancer/{}/{}",
            region, account_id, kind, self.name
        )
    }
}

/// Metric alarm
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alarm {
    pub name: String,
    /// `OK`, `ALARM` or `INSUFFICIENT_DATA`
    pub state_value: String,
    /// Last state transition
    #[serde(default)]
    pub state_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metric_name: Option<String>,
    #[serde(default)]
    pub tags: Tags,
}

impl TaggedResource for Alarm {
    fn resource_id(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }

    fn arn(&self, account_id: &str, region: &str) -> String {
        format!(
            "arn:aws:cloudwatch:{}:{}:alarm:{}",
            region, account_id, self.name
        )
    }
}

/// Backup vault and the number of recovery points it holds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupVault {
    pub name: String,
    #[serde(default)]
    pub recovery_points: u64,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Tags,
}

impl TaggedResource for BackupVault {
    fn resource_id(&self) -> &str {
        &self.name
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }

    fn arn(&self, account_id: &str, region: &str) -> String {
        format!(
            "arn:aws:backup:{}:{}:backup-vault:{}",
            region, account_id, self.name
        )
    }
}

/// Account-level IAM summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountSummary {
    #[serde(default)]
    pub root_access_keys_present: bool,
    #[serde(default)]
    pub root_mfa_enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingress_port_coverage() {
        let rule = IngressRule {
            protocol: "tcp".into(),
            from_port: Some(20),
            to_port: Some(25),
            cidrs: vec!["0.0.0.0/0".into()],
        };
        assert!(rule.open_to_world());
        assert!(rule.covers_port(22));
        assert!(!rule.covers_port(3389));

        let all = IngressRule {
            protocol: "-1".into(),
            from_port: None,
            to_port: None,
            cidrs: vec!["10.0.0.0/8".into()],
        };
        assert!(!all.open_to_world());
        assert!(all.covers_port(3389));
    }

    #[test]
    fn test_arns() {
        let bucket = Bucket {
            name: "logs".into(),
            public_read: false,
            encrypted: true,
            tags: Tags::new(),
        };
        assert_eq!(bucket.arn("111111111111", "us-east-1"), "arn:aws:s3:::logs");

        let volume = Volume {
            id: "vol-1".into(),
            volume_type: "gp3".into(),
            size_gib: 8,
            state: "available".into(),
            encrypted: false,
            tags: Tags::new(),
        };
        assert_eq!(
            volume.arn("111111111111", "eu-west-1"),
            "arn:aws:ec2:eu-west-1:111111111111:volume/vol-1"
        );
    }

    #[test]
    fn test_load_balancer_health_and_arn() {
        let lb = LoadBalancer {
            name: "edge".into(),
            lb_type: "network".into(),
            scheme: "internal".into(),
            target_groups: vec![
                TargetGroup {
                    name: "blue".into(),
                    healthy_targets: 0,
                    unhealthy_targets: 2,
                },
                TargetGroup {
                    name: "green".into(),
                    healthy_targets: 3,
                    unhealthy_targets: 0,
                },
            ],
            tags: Tags::new(),
        };
        assert_eq!(lb.healthy_targets(), 3);
        assert_eq!(
            lb.arn("111111111111", "us-east-1"),
            "arn:aws:elasticloadbalancing:us-east-1:111111111111:loadbalancer/net/edge"
        );
    }
}
