/// Make a POST request sending and expecting JSON, with an optional bearer
/// token. If JSON deser fails, emit a `WARN` level tracing event
#[macro_export]
macro_rules! json_post {
    ($client:expr, $url:expr, $params:expr,) => {
        $crate::json_post!($client, $url, $params)
    };

    ($client:expr, $url:expr, $params:expr) => {
        $crate::json_post!($client, $url, $params, bearer = None::<&str>)
    };

    ($client:expr, $url:expr, $params:expr, bearer = $token:expr) => {{
        let url = $url;
        let mut req = $client.post(url.clone()).json($params);
        if let Some(token) = $token {
            req = req.bearer_auth(token);
        }
        let resp: reqwest::Response = req.send().await?;
        let text = resp.text().await?;

        let result = serde_json::from_str(&text).map_err(Into::<$crate::GsnError>::into);

        if result.is_err() {
            tracing::warn!(
                method = "POST",
                url = %url,
                params = serde_json::to_string(&$params).unwrap_or_default().as_str(),
                response = text.as_str(),
                "Unexpected response from server"
            );
        }
        result
    }};
}

#[macro_export]
/// Make a GET request sending and expecting JSON.
/// if JSON deser fails, emit a `WARN` level tracing event
macro_rules! json_get {
    ($client:expr, $url:expr, $expected:ty,) => {
        $crate::json_get!($client, $url, $expected)
    };
    ($client:expr, $url:expr, $expected:ty) => {{
        let url = $url;
        let resp = $client.get(url.clone()).send().await?;
        let text = resp.text().await?;

        let result = serde_json::from_str::<$expected>(&text).map_err(Into::<$crate::GsnError>::into);

        if result.is_err() {
            tracing::warn!(
                method = "GET",
                url = %url,
                response = text.as_str(),
                "Unexpected response from server"
            );
        }
        result
    }};
}
