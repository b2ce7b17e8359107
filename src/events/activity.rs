/// Name and code reported for activity numbers missing from the catalogue.
pub const UNKNOWN_ACTIVITY: (&str, &str) = ("UNKNOWN_ACTIVITY", "UNKNOWN_ACTIVITY");

/// Known activity numbers with their display name and machine code, sorted by
/// number.
const CATALOGUE: &[(i64, &str, &str)] = &[
    (0, "Peer added", "user.peer.add"),
    (1, "Peer added", "peer.setupkey.add"),
    (2, "User joined", "user.join"),
    (3, "User invited", "user.invite"),
    (4, "Account created", "account.create"),
    (5, "Peer deleted", "user.peer.delete"),
    (6, "Rule added", "rule.add"),
    (7, "Rule updated", "rule.update"),
    (8, "Rule deleted", "rule.delete"),
    (9, "Policy added", "policy.add"),
    (10, "Policy updated", "policy.update"),
    (11, "Policy deleted", "policy.delete"),
    (12, "Setup key created", "setupkey.add"),
    (13, "Setup key updated", "setupkey.update"),
    (14, "Setup key revoked", "setupkey.revoke"),
    (15, "Setup key overused", "setupkey.overuse"),
    (16, "Group created", "group.add"),
    (17, "Group updated", "group.update"),
    (18, "Group added to peer", "peer.group.add"),
    (19, "Group removed from peer", "peer.group.delete"),
    (20, "Group added to user", "user.group.add"),
    (21, "Group removed from user", "user.group.delete"),
    (22, "User role updated", "user.role.update"),
    (23, "Group added to setup key", "setupkey.group.add"),
    (24, "Group removed from setup key", "setupkey.group.delete"),
    (
        25,
        "Group added to disabled management DNS setting",
        "dns.setting.disabled.management.group.add",
    ),
    (
        26,
        "Group removed from disabled management DNS setting",
        "dns.setting.disabled.management.group.delete",
    ),
    (27, "Route created", "route.add"),
    (28, "Route deleted", "route.delete"),
    (29, "Route updated", "route.update"),
    (30, "Peer SSH server enabled", "peer.ssh.enable"),
    (31, "Peer SSH server disabled", "peer.ssh.disable"),
    (32, "Peer renamed", "peer.rename"),
    (33, "Peer login expiration enabled", "peer.login.expiration.enable"),
    (34, "Peer login expiration disabled", "peer.login.expiration.disable"),
    (35, "Nameserver group created", "nameserver.group.add"),
    (36, "Nameserver group deleted", "nameserver.group.delete"),
    (37, "Nameserver group updated", "nameserver.group.update"),
    (
        38,
        "Account peer login expiration enabled",
        "account.setting.peer.login.expiration.enable",
    ),
    (
        39,
        "Account peer login expiration disabled",
        "account.setting.peer.login.expiration.disable",
    ),
    (
        40,
        "Account peer login expiration duration updated",
        "account.setting.peer.login.expiration.update",
    ),
    (41, "Personal access token created", "personal.access.token.create"),
    (42, "Personal access token deleted", "personal.access.token.delete"),
    (43, "Service user created", "service.user.create"),
    (44, "Service user deleted", "service.user.delete"),
    (45, "User blocked", "user.block"),
    (46, "User unblocked", "user.unblock"),
    (47, "User deleted", "user.delete"),
    (48, "Group deleted", "group.delete"),
    (49, "User logged in peer", "user.peer.login"),
    (50, "Peer login expired", "peer.login.expire"),
    (51, "Dashboard login", "dashboard.login"),
    (52, "Integration created", "integration.create"),
    (53, "Integration updated", "integration.update"),
    (54, "Integration deleted", "integration.delete"),
    (
        55,
        "Account peer approval enabled",
        "account.setting.peer.approval.enable",
    ),
    (
        56,
        "Account peer approval disabled",
        "account.setting.peer.approval.disable",
    ),
    (57, "Peer approved", "peer.approve"),
    (58, "Peer approval revoked", "peer.approval.revoke"),
    (59, "Transferred owner role", "transferred.owner.role"),
    (60, "Posture check created", "posture.check.create"),
    (61, "Posture check updated", "posture.check.update"),
    (62, "Posture check deleted", "posture.check.delete"),
    (
        63,
        "Peer inactivity expiration enabled",
        "peer.inactivity.expiration.enable",
    ),
    (
        64,
        "Peer inactivity expiration disabled",
        "peer.inactivity.expiration.disable",
    ),
    (
        65,
        "Account peer inactivity expiration enabled",
        "account.peer.inactivity.expiration.enable",
    ),
    (
        66,
        "Account peer inactivity expiration disabled",
        "account.peer.inactivity.expiration.disable",
    ),
    (
        67,
        "Account peer inactivity expiration duration updated",
        "account.peer.inactivity.expiration.update",
    ),
    (68, "Setup key deleted", "setupkey.delete"),
    (
        69,
        "User group propagation enabled",
        "account.setting.group.propagation.enable",
    ),
    (
        70,
        "User group propagation disabled",
        "account.setting.group.propagation.disable",
    ),
    (
        71,
        "Account routing peer DNS resolution enabled",
        "account.setting.routing.peer.dns.resolution.enable",
    ),
    (
        72,
        "Account routing peer DNS resolution disabled",
        "account.setting.routing.peer.dns.resolution.disable",
    ),
    (73, "Network created", "network.create"),
    (74, "Network updated", "network.update"),
    (75, "Network deleted", "network.delete"),
    (76, "Network resource created", "network.resource.create"),
    (77, "Network resource updated", "network.resource.update"),
    (78, "Network resource deleted", "network.resource.delete"),
    (79, "Network router created", "network.router.create"),
    (80, "Network router updated", "network.router.update"),
    (81, "Network router deleted", "network.router.delete"),
    (82, "Resource added to group", "resource.group.add"),
    (83, "Resource removed from group", "resource.group.delete"),
    (84, "Account DNS domain updated", "account.dns.domain.update"),
    (
        85,
        "Account lazy connection enabled",
        "account.setting.lazy.connection.enable",
    ),
    (
        86,
        "Account lazy connection disabled",
        "account.setting.lazy.connection.disable",
    ),
];

/// Returns `(name, code)` for an activity number, or [`UNKNOWN_ACTIVITY`].
pub fn describe(activity: i64) -> (&'static str, &'static str) {
    CATALOGUE
        .binary_search_by_key(&activity, |(number, _, _)| *number)
        .map(|idx| (CATALOGUE[idx].1, CATALOGUE[idx].2))
        .unwrap_or(UNKNOWN_ACTIVITY)
}
