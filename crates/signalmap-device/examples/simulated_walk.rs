/// signalmap-device 模拟扫描示例
///
/// 模拟观察者沿直线离开一个信标，演示注册表更新、连接和热力图构建。
/// 配置从当前目录的 signalmap.toml 读取（不存在时使用默认值）。

use chrono::{Duration, Utc};
use signalmap_config::ConfigLoader;
use signalmap_device::simulator::{
    ConnectScript, SimulatedConnector, SimulatedDiscovery, SimulatedLocation,
};
use signalmap_device::{DiscoveryEvent, Favorites, ListingFilter, RegistryEvent, ScanSession};
use signalmap_logging::init_logging;
use signalmap_types::{DeviceId, GeoCoordinate};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ConfigLoader::new(".").load_validated()?;
    init_logging(&config.logging)?;

    println!("=== SignalMap 模拟扫描示例 ===\n");

    let discovery = Arc::new(SimulatedDiscovery::powered_on());
    let location = Arc::new(SimulatedLocation::default());
    let connector = Arc::new(SimulatedConnector::new());

    let session = ScanSession::new(
        &config,
        discovery.clone(),
        location.clone(),
        connector.clone(),
    )
    .await?;

    let mut events = session.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let RegistryEvent::ServicesUpdated(id) = event {
                println!("  [通知] 设备 {} 服务已更新", id.short());
            }
        }
    });

    session.start().await?;
    println!("✓ 扫描已开始");

    // 1. 沿正北方向每秒走 2 米，信号逐渐变弱
    let beacon = DeviceId::random();
    let start = Utc::now();
    let origin = GeoCoordinate::new(31.2304, 121.4737);
    for step in 0..10 {
        let now = start + Duration::milliseconds(step * 1100);
        let position = GeoCoordinate::new(
            origin.latitude + step as f64 * 2.0 / 111_320.0,
            origin.longitude,
        );
        location.move_to(position, now).await?;
        discovery
            .advertise(
                DiscoveryEvent::new(beacon, -45 - step as i32 * 4, now)
                    .with_name("Beacon")
                    .with_services(vec!["FEAA".to_string()]),
            )
            .await?;
    }
    session.flush().await?;

    if let Some(record) = session.device(&beacon).await {
        println!(
            "✓ {}: {} dBm, {} 个采样, 信号格 {:.2}",
            record.display_name,
            record.signal_strength,
            record.samples.len(),
            record.signal_level()
        );
    }

    // 2. 连接并发现服务
    connector
        .script(beacon, ConnectScript::Succeed(vec!["180F".to_string()]))
        .await;
    session.connect(beacon).await;
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    // 3. 构建热力图
    println!("\n--- 热力图 ---");
    let cells = session.build_heatmap(&beacon).await;
    println!("✓ 共 {} 个网格", cells.len());
    for cell in cells.iter().step_by(cells.len().max(1) / 5 + 1) {
        println!(
            "  ({:>2},{:>2}) {} {}",
            cell.row,
            cell.column,
            cell.color.to_hex(),
            cell.label
        );
    }

    // 4. 设备列表
    let favorites = Favorites::in_memory();
    favorites.add(beacon, "Beacon").await?;
    let listing = session.listing(&favorites, ListingFilter::default()).await?;
    println!(
        "\n✓ 收藏 {} 个，附近 {} 个",
        listing.favorite_count(),
        listing.nearby_count()
    );

    session.stop().await?;
    session.shutdown().await?;
    println!("\n=== 示例完成 ===");
    Ok(())
}
