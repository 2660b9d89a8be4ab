const ETCD_ENDPOINTS: &str = "KV_ETCD_ENDPOINTS";

/// etcd endpoints from the environment, comma separated
pub fn get_etcd_endpoints() -> Option<Vec<String>> {
    let endpoints_from_env = std::env::var(ETCD_ENDPOINTS);
    endpoints_from_env.ok().and_then(|res| parse_endpoint_list(&res))
}

const ETCD_PREFIX: &str = "KV_ETCD_PREFIX";

pub fn get_etcd_prefix() -> Option<String> {
    let prefix_from_env = std::env::var(ETCD_PREFIX);
    prefix_from_env.ok()
}

/// Split a comma separated endpoint list, `None` if it holds no endpoint
pub fn parse_endpoint_list(raw: &str) -> Option<Vec<String>> {
    let endpoints: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|endpoint| !endpoint.is_empty())
        .map(String::from)
        .collect();

    (!endpoints.is_empty()).then_some(endpoints)
}
