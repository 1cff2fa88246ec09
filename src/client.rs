// TCP 客户端：连接采集棒（默认 8899 端口），读环喂 Framer → Plant，写环发请求
// 采集棒会把所有 Modbus 报文广播给每个已连接客户端，所以光靠监听也能把 Plant 喂满；
// 心跳请求必须原样回应，否则会被断开。重连策略留给调用方。

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};

use crate::framer::Framer;
use crate::model::plant::Plant;
use crate::pdu::{Pdu, TransparentRequest};

pub const DEFAULT_PORT: u16 = 8899;

/// 发送队列深度；满了说明对端长时间不读
const SEND_QUEUE_DEPTH: usize = 64;
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Client {
    plant: Arc<RwLock<Plant>>,
    tx: mpsc::Sender<Vec<u8>>,
}

impl Client {
    /// 建立连接并启动读写任务
    pub async fn connect(host: &str, port: u16) -> Result<Self> {
        let stream = TcpStream::connect((host, port))
            .await
            .with_context(|| format!("connecting to data adapter at {}:{}", host, port))?;
        info!("connected to data adapter at {}:{}", host, port);
        let (mut reader, mut writer) = stream.into_split();

        let (tx, mut rx) = mpsc::channel::<Vec<u8>>(SEND_QUEUE_DEPTH);
        let plant = Arc::new(RwLock::new(Plant::new()));

        // 写任务：顺序发送，保证命令列表的次序
        tokio::spawn(async move {
            while let Some(frame) = rx.recv().await {
                if let Err(e) = writer.write_all(&frame).await {
                    warn!("write to data adapter failed: {}", e);
                    break;
                }
            }
        });

        // 读任务：取帧、回心跳、其余交给 Plant
        let plant_for_reader = plant.clone();
        let heartbeat_tx = tx.clone();
        tokio::spawn(async move {
            let mut framer = Framer::client();
            let mut buf = [0u8; 512];
            loop {
                let n = match reader.read(&mut buf).await {
                    Ok(0) => {
                        info!("connection closed by data adapter");
                        break;
                    }
                    Ok(n) => n,
                    Err(e) => {
                        warn!("read from data adapter failed: {}", e);
                        break;
                    }
                };
                for pdu in framer.feed(&buf[..n]) {
                    match pdu {
                        Pdu::HeartbeatRequest(hb) => {
                            debug!("echoing heartbeat from {}", hb.data_adapter_serial_number);
                            if heartbeat_tx.send(hb.encode_response()).await.is_err() {
                                return;
                            }
                        }
                        other => plant_for_reader.write().await.update(&other),
                    }
                }
            }
        });

        Ok(Self { plant, tx })
    }

    /// 共享的 Plant；观察者钩子也挂在这上面
    pub fn plant(&self) -> Arc<RwLock<Plant>> {
        self.plant.clone()
    }

    pub async fn send(&self, request: &TransparentRequest) -> Result<()> {
        self.tx
            .send_timeout(request.encode(), SEND_TIMEOUT)
            .await
            .map_err(|e| anyhow::anyhow!("send queue stalled: {}", e))?;
        Ok(())
    }

    /// 按给定顺序发送一组请求（命令构造器的输出）
    pub async fn send_all(&self, requests: &[TransparentRequest]) -> Result<()> {
        for request in requests {
            self.send(request).await?;
        }
        Ok(())
    }

    /// 按 Plant 的刷新计划下发读请求
    pub async fn refresh(&self, full_refresh: bool) -> Result<()> {
        let plan = self.plant.read().await.refresh_plan(full_refresh, None, None);
        for (address, base) in plan {
            let request = match base.kind {
                crate::model::register::RegisterKind::Holding => {
                    TransparentRequest::read_holding_registers(base.index, 60)
                }
                crate::model::register::RegisterKind::Input => {
                    TransparentRequest::read_input_registers(base.index, 60)
                }
            };
            self.send(&request.with_slave_address(address)).await?;
        }
        Ok(())
    }
}
